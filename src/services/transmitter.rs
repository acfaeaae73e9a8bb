//! Chunk Transmitter: reads chunk ranges off disk and pushes them through a
//! [`ChunkTransport`], concurrently and with per-chunk retry.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, pin_mut, stream};
use std::{io::SeekFrom, path::Path, sync::Arc};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    errors::{ChunkSendError, UploadError},
    models::chunk::{ChunkHeader, ChunkSpec},
    services::{
        progress::{ProgressReporter, SessionState},
        retry::RetryPolicy,
        session::PreparedUpload,
    },
};

/// Wire-level delivery of a single chunk. The HTTP uploader is one
/// implementation; tests plug in their own.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Sends one chunk. `Ok` means the server acknowledged it.
    async fn send(&self, header: &ChunkHeader, data: Bytes) -> Result<(), ChunkSendError>;

    /// Asks whether the server already holds this chunk.
    async fn probe(&self, header: &ChunkHeader) -> Result<bool, ChunkSendError>;
}

/// How a transmission run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    /// Every chunk of the plan is acknowledged.
    Completed,
    /// The session was cancelled; the acknowledged set is frozen.
    Cancelled,
}

pub struct ChunkTransmitter {
    transport: Arc<dyn ChunkTransport>,
    parallelism: usize,
    retry: RetryPolicy,
    probe_first: bool,
}

impl ChunkTransmitter {
    pub fn new(
        transport: Arc<dyn ChunkTransport>,
        parallelism: usize,
        retry: RetryPolicy,
        probe_first: bool,
    ) -> Self {
        Self {
            transport,
            parallelism: parallelism.max(1),
            retry,
            probe_first,
        }
    }

    /// Sends every chunk not yet acknowledged in `state`, up to
    /// `parallelism` at a time, reporting each new acknowledgment.
    ///
    /// Returns on the first chunk that fails for good. Cancellation stops
    /// dispatch immediately and drops whatever is still in flight.
    pub async fn transmit(
        &self,
        upload: &PreparedUpload,
        state: &SessionState,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Transmission, UploadError> {
        let pending: Vec<ChunkSpec> = upload
            .plan()
            .chunks()
            .filter(|spec| !state.is_acknowledged(spec.index))
            .collect();
        debug!(
            session = %upload.session_id(),
            pending = pending.len(),
            total = upload.plan().total_chunks(),
            "dispatching chunks"
        );

        let deliveries = stream::iter(pending)
            .map(|spec| self.deliver(upload, spec))
            .buffer_unordered(self.parallelism);
        pin_mut!(deliveries);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Transmission::Cancelled),
                next = deliveries.next() => match next {
                    None => return Ok(Transmission::Completed),
                    Some(Ok(spec)) => {
                        if cancel.is_cancelled() {
                            return Ok(Transmission::Cancelled);
                        }
                        if state.acknowledge(&spec) {
                            reporter.progress(state.snapshot());
                        }
                    }
                    Some(Err(err)) => return Err(err),
                },
            }
        }
    }

    /// Gets one chunk onto the server: probe, read, then send with retry.
    async fn deliver(
        &self,
        upload: &PreparedUpload,
        spec: ChunkSpec,
    ) -> Result<ChunkSpec, UploadError> {
        let header = upload.header(&spec);

        if self.probe_first {
            match self.transport.probe(&header).await {
                Ok(true) => {
                    debug!(session = %upload.session_id(), chunk = spec.index, "already on server");
                    return Ok(spec);
                }
                Ok(false) => {}
                Err(err) => {
                    debug!(chunk = spec.index, error = %err, "probe failed, sending anyway");
                }
            }
        }

        let data = read_chunk(upload.path(), &spec)
            .await
            .map_err(|err| UploadError::ChunkUploadFailed {
                chunk: spec.index,
                attempts: 0,
                reason: format!("reading source file: {err}"),
            })?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.send(&header, data.clone()).await {
                Ok(()) => {
                    debug!(
                        session = %upload.session_id(),
                        chunk = spec.index,
                        attempt,
                        "chunk acknowledged"
                    );
                    return Ok(spec);
                }
                Err(ChunkSendError::Transient(reason)) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        session = %upload.session_id(),
                        chunk = spec.index,
                        attempt,
                        ?delay,
                        %reason,
                        "chunk failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(UploadError::ChunkUploadFailed {
                        chunk: spec.index,
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Reads exactly the bytes of `spec` from `path`.
///
/// Each call opens its own handle so concurrent chunks never share a cursor.
pub async fn read_chunk(path: &Path, spec: &ChunkSpec) -> std::io::Result<Bytes> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(spec.offset)).await?;
    let len = usize::try_from(spec.len)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "chunk too large"))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}
