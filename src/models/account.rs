//! Account request payloads.
//!
//! Change-password and reset-init send their single value as the raw request
//! body; only reset-finish has a JSON shape.

use serde::{Deserialize, Serialize};

/// Body of `api/account/reset_password/finish`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyAndPassword {
    pub key: String,
    pub new_password: String,
}
