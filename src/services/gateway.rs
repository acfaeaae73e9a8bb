//! Record Access Gateway: CRUD over upload records.

use async_trait::async_trait;

use crate::{errors::GatewayError, models::upload::UploadRecord};

const MAX_ID_LEN: usize = 64;

/// Generic CRUD façade used by the completion resolver and the record
/// commands. Business validation stays on the server.
#[async_trait]
pub trait RecordGateway: Send + Sync {
    async fn list(&self) -> Result<Vec<UploadRecord>, GatewayError>;

    async fn get(&self, id: &str) -> Result<UploadRecord, GatewayError>;

    /// Creates a record the server assigns an id to, returning that id.
    async fn create(&self, record: &UploadRecord) -> Result<String, GatewayError>;

    async fn update(&self, record: &UploadRecord) -> Result<UploadRecord, GatewayError>;

    async fn delete(&self, id: &str) -> Result<(), GatewayError>;
}

/// Rejects ids that could not have come from the server or a session:
/// empty, over-long, or containing anything but ASCII alphanumerics, `-`
/// and `_`.
pub fn validate_id(id: &str) -> Result<(), GatewayError> {
    let well_formed = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if well_formed {
        Ok(())
    } else {
        Err(GatewayError::InvalidId(id.to_string()))
    }
}
