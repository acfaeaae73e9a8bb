//! Upload Session Initiator and the session controller that ties the
//! transmitter, reporter and resolver together.

use futures::StreamExt;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs::File;
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    config::UploadSettings,
    errors::UploadError,
    models::{
        chunk::{ChunkHeader, ChunkPlan, ChunkSpec},
        event::{Outcome, ProgressEvent, UploadEvent},
        upload::UploadRecord,
    },
    services::{
        gateway::{RecordGateway, validate_id},
        progress::{ProgressReporter, ResumePoint, SessionState, UploadHandle},
        resolver::CompletionResolver,
        transmitter::{ChunkTransmitter, ChunkTransport, Transmission},
    },
};

/// A validated local file with its session id and chunk plan.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    session_id: String,
    path: PathBuf,
    original_name: String,
    plan: ChunkPlan,
    local_md5: Option<String>,
}

impl PreparedUpload {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn local_md5(&self) -> Option<&str> {
        self.local_md5.as_deref()
    }

    pub fn header(&self, spec: &ChunkSpec) -> ChunkHeader {
        ChunkHeader::new(&self.session_id, &self.original_name, &self.plan, spec)
    }
}

/// Turns a path into a [`PreparedUpload`] without touching the network.
#[derive(Debug, Clone)]
pub struct SessionInitiator {
    chunk_size: u64,
    max_file_size: u64,
    compute_md5: bool,
}

impl SessionInitiator {
    pub fn new(chunk_size: u64, max_file_size: u64, compute_md5: bool) -> Self {
        Self {
            chunk_size,
            max_file_size,
            compute_md5,
        }
    }

    /// Validates the file and plans its chunks. `session_id` re-attaches to
    /// an earlier session; `None` starts a fresh one.
    pub async fn prepare(
        &self,
        path: &Path,
        session_id: Option<String>,
    ) -> Result<PreparedUpload, UploadError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|err| UploadError::invalid_file(path, format!("cannot stat: {err}")))?;
        if !metadata.is_file() {
            return Err(UploadError::invalid_file(path, "not a regular file"));
        }

        let total_size = metadata.len();
        if total_size == 0 {
            return Err(UploadError::invalid_file(path, "file is empty"));
        }
        if total_size > self.max_file_size {
            return Err(UploadError::invalid_file(
                path,
                format!(
                    "file is {total_size} bytes, the limit is {}",
                    self.max_file_size
                ),
            ));
        }

        File::open(path)
            .await
            .map_err(|err| UploadError::invalid_file(path, format!("unreadable: {err}")))?;

        let original_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::invalid_file(path, "path has no file name"))?;

        let plan = ChunkPlan::new(total_size, self.chunk_size).ok_or_else(|| {
            UploadError::invalid_file(
                path,
                format!("cannot be split into chunks of {} bytes", self.chunk_size),
            )
        })?;

        let session_id = match session_id {
            Some(id) => {
                validate_id(&id)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let local_md5 = if self.compute_md5 {
            let digest = file_md5(path)
                .await
                .map_err(|err| UploadError::invalid_file(path, format!("unreadable: {err}")))?;
            Some(digest)
        } else {
            None
        };

        Ok(PreparedUpload {
            session_id,
            path: path.to_path_buf(),
            original_name,
            plan,
            local_md5,
        })
    }
}

/// Streams the whole file through MD5 and returns the lowercase hex digest.
pub async fn file_md5(path: &Path) -> std::io::Result<String> {
    let file = File::open(path).await?;
    let mut stream = ReaderStream::new(file);
    let mut digest = md5::Context::new();
    while let Some(chunk) = stream.next().await {
        digest.consume(&chunk?);
    }
    Ok(format!("{:x}", digest.compute()))
}

/// Session controller owned by whatever view starts uploads.
///
/// Each `start`/`resume` spawns one session and hands back its
/// [`UploadHandle`]; the controller itself holds no per-session state.
pub struct Uploader {
    initiator: SessionInitiator,
    transmitter: Arc<ChunkTransmitter>,
    resolver: CompletionResolver,
}

impl Uploader {
    pub fn new(
        settings: &UploadSettings,
        transport: Arc<dyn ChunkTransport>,
        gateway: Arc<dyn RecordGateway>,
    ) -> Self {
        Self {
            initiator: SessionInitiator::new(
                settings.chunk_size,
                settings.max_file_size,
                settings.verify_checksum,
            ),
            transmitter: Arc::new(ChunkTransmitter::new(
                transport,
                settings.parallelism,
                settings.chunk_retry,
                settings.probe_chunks,
            )),
            resolver: CompletionResolver::new(gateway, settings.resolve_retry),
        }
    }

    /// Starts a fresh session for `path`.
    ///
    /// An unusable file fails here with `InvalidFile`; no session is created.
    pub async fn start(&self, path: &Path) -> Result<UploadHandle, UploadError> {
        self.launch(path, None).await
    }

    /// Re-attaches to an earlier session. Chunks listed in `point` are not
    /// sent again; with probing on, neither is anything the server reports
    /// as present.
    pub async fn resume(
        &self,
        path: &Path,
        point: ResumePoint,
    ) -> Result<UploadHandle, UploadError> {
        self.launch(path, Some(point)).await
    }

    /// Follows the session to its end, handing each progress event to
    /// `on_progress`, then resolves the finalized record.
    ///
    /// A cancelled session ends in `Cancelled`; the handle still yields its
    /// resume point afterwards.
    pub async fn complete(
        &self,
        handle: &mut UploadHandle,
        mut on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<UploadRecord, UploadError> {
        loop {
            match handle.next_event().await {
                Some(UploadEvent::Progress(progress)) => on_progress(&progress),
                Some(UploadEvent::Finished(Outcome::Success { session_id })) => {
                    return self.resolver.resolve(&session_id, handle.local_md5()).await;
                }
                Some(UploadEvent::Finished(Outcome::Failure { reason, .. })) => return Err(reason),
                None => return Err(UploadError::Cancelled(handle.session_id().to_string())),
            }
        }
    }

    async fn launch(
        &self,
        path: &Path,
        point: Option<ResumePoint>,
    ) -> Result<UploadHandle, UploadError> {
        let resume_id = point.as_ref().map(|p| p.session_id.clone());
        let prepared = self.initiator.prepare(path, resume_id).await?;

        let state = Arc::new(SessionState::new(prepared.session_id(), prepared.plan()));
        if let Some(point) = &point {
            for spec in point
                .acknowledged
                .iter()
                .filter_map(|index| prepared.plan().chunk(*index))
            {
                state.acknowledge(&spec);
            }
        }

        let cancel = CancellationToken::new();
        let (reporter, events) = ProgressReporter::channel(cancel.clone());
        let handle = UploadHandle::new(
            Arc::clone(&state),
            events,
            cancel.clone(),
            prepared.local_md5().map(str::to_string),
        );

        info!(
            session = %prepared.session_id(),
            file = %prepared.original_name(),
            size = prepared.plan().total_size(),
            chunks = prepared.plan().total_chunks(),
            already_acknowledged = state.chunks_acknowledged(),
            "upload session started"
        );

        let transmitter = Arc::clone(&self.transmitter);
        tokio::spawn(async move {
            let session_id = prepared.session_id().to_string();
            let outcome = match transmitter
                .transmit(&prepared, &state, &reporter, &cancel)
                .await
            {
                Ok(Transmission::Completed) => {
                    info!(session = %session_id, "all chunks acknowledged");
                    Outcome::Success { session_id }
                }
                Ok(Transmission::Cancelled) => {
                    info!(
                        session = %session_id,
                        acknowledged = state.chunks_acknowledged(),
                        "upload cancelled"
                    );
                    return;
                }
                Err(reason) => {
                    error!(session = %session_id, error = %reason, "upload failed");
                    Outcome::Failure { session_id, reason }
                }
            };
            reporter.finish(outcome);
        });

        Ok(handle)
    }
}
