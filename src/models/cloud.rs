//! Deployment info shown in the footer.

use serde::{Deserialize, Serialize};

/// Where the server is running. Both names are `"local"` outside a cloud host.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloudInfo {
    pub service_name: Option<String>,
    pub container_name: Option<String>,
}
