//! Completion Resolver: turns a successful session into its finalized record.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    errors::{GatewayError, UploadError},
    models::upload::UploadRecord,
    services::{gateway::RecordGateway, retry::RetryPolicy},
};

pub struct CompletionResolver {
    gateway: Arc<dyn RecordGateway>,
    retry: RetryPolicy,
}

impl CompletionResolver {
    pub fn new(gateway: Arc<dyn RecordGateway>, retry: RetryPolicy) -> Self {
        Self { gateway, retry }
    }

    /// Fetches the record of `session_id` until the server has finalized it.
    ///
    /// `NotFound`, transient failures and records that are not finalized yet
    /// are retried with backoff; any other gateway error is returned as is.
    /// With `expected_md5`, the server checksum must match it.
    pub async fn resolve(
        &self,
        session_id: &str,
        expected_md5: Option<&str>,
    ) -> Result<UploadRecord, UploadError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let pending = match self.gateway.get(session_id).await {
                Ok(record) if record.is_finalized() => {
                    return verify(record, session_id, expected_md5);
                }
                Ok(_) => "record not finalized".to_string(),
                Err(err @ GatewayError::NotFound(_)) => err.to_string(),
                Err(err) if err.is_transient() => err.to_string(),
                Err(err) => return Err(err.into()),
            };

            if attempt >= self.retry.max_attempts {
                warn!(session = %session_id, attempts = attempt, "giving up on upload record");
                return Err(UploadError::RecordNotAvailable {
                    id: session_id.to_string(),
                    attempts: attempt,
                });
            }
            let delay = self.retry.delay(attempt);
            debug!(session = %session_id, attempt, ?delay, reason = %pending, "record not ready");
            tokio::time::sleep(delay).await;
        }
    }
}

fn verify(
    record: UploadRecord,
    session_id: &str,
    expected_md5: Option<&str>,
) -> Result<UploadRecord, UploadError> {
    if let (Some(expected), Some(actual)) = (expected_md5, record.md5sum.as_deref())
        && !expected.eq_ignore_ascii_case(actual)
    {
        return Err(UploadError::ChecksumMismatch {
            id: session_id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    info!(session = %session_id, md5 = ?record.md5sum, "upload finalized");
    Ok(record)
}
