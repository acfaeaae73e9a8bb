//! The upload record as exposed by `api/uploads`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::wire_date;

/// Client-side projection of a server-owned upload record.
///
/// The server boxes every field, so anything it has not filled in yet may
/// arrive as `null`. Dates are translated at the serde boundary.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    /// Client-supplied session UUID for chunked uploads. `None` only on create.
    pub id: Option<String>,

    /// Display name of the source file.
    pub original_name: Option<String>,

    /// Session start date.
    #[serde(default, with = "wire_date")]
    pub uploaded_at: Option<NaiveDate>,

    /// MD5 of the reassembled content, set on finalization.
    pub md5sum: Option<String>,

    /// Flips to `true` once, when every chunk is on the server.
    #[serde(default, deserialize_with = "null_as_false")]
    pub upload_complete: bool,

    pub total_chunks: Option<u32>,

    pub total_size: Option<u64>,

    /// Finalization date.
    #[serde(default, with = "wire_date")]
    pub completed_at: Option<NaiveDate>,

    /// Server fields the client does not model, such as the per-chunk
    /// bitmap. Sent back untouched on update.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UploadRecord {
    /// True when the server has reassembled and checksummed the upload.
    pub fn is_finalized(&self) -> bool {
        self.upload_complete && self.md5sum.is_some() && self.completed_at.is_some()
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
