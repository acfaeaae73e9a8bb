//! Events a running upload session reports to whoever holds its handle.

use crate::errors::UploadError;

/// Aggregate progress after a chunk acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub session_id: String,
    pub chunks_acknowledged: u32,
    pub total_chunks: u32,
    pub bytes_transferred: u64,
    pub total_size: u64,
}

impl ProgressEvent {
    /// Completed fraction in `[0, 1]`, by bytes.
    pub fn fraction(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.bytes_transferred as f64 / self.total_size as f64
    }
}

/// Terminal result of a session. At most one is delivered per session.
#[derive(Debug)]
pub enum Outcome {
    Success { session_id: String },
    Failure { session_id: String, reason: UploadError },
}

#[derive(Debug)]
pub enum UploadEvent {
    Progress(ProgressEvent),
    Finished(Outcome),
}
