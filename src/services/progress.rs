//! Progress Reporter: acknowledgment bookkeeping, the per-session event
//! channel, and the handle the caller owns.

use futures::Stream;
use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{
    chunk::{ChunkPlan, ChunkSpec},
    event::{Outcome, ProgressEvent, UploadEvent},
};

/// Which chunks the server has acknowledged.
///
/// Shared between the transmitting task and the handle. Everything is
/// atomic, so no lock is ever taken.
#[derive(Debug)]
pub struct SessionState {
    session_id: String,
    total_chunks: u32,
    total_size: u64,
    acknowledged: Vec<AtomicBool>,
    chunks_acknowledged: AtomicU32,
    bytes_transferred: AtomicU64,
}

impl SessionState {
    pub fn new(session_id: &str, plan: &ChunkPlan) -> Self {
        Self {
            session_id: session_id.to_string(),
            total_chunks: plan.total_chunks(),
            total_size: plan.total_size(),
            acknowledged: (0..plan.total_chunks()).map(|_| AtomicBool::new(false)).collect(),
            chunks_acknowledged: AtomicU32::new(0),
            bytes_transferred: AtomicU64::new(0),
        }
    }

    /// Marks a chunk acknowledged. Returns `false` if it already was, in
    /// which case nothing is counted.
    pub fn acknowledge(&self, spec: &ChunkSpec) -> bool {
        let Some(flag) = self.flag(spec.index) else {
            return false;
        };
        if flag.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.bytes_transferred.fetch_add(spec.len, Ordering::AcqRel);
        self.chunks_acknowledged.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub fn is_acknowledged(&self, index: u32) -> bool {
        self.flag(index)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    pub fn chunks_acknowledged(&self) -> u32 {
        self.chunks_acknowledged.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.chunks_acknowledged() == self.total_chunks
    }

    /// 1-based indices of every acknowledged chunk, ascending.
    pub fn acknowledged_indices(&self) -> Vec<u32> {
        (1..=self.total_chunks)
            .filter(|index| self.is_acknowledged(*index))
            .collect()
    }

    pub fn snapshot(&self) -> ProgressEvent {
        ProgressEvent {
            session_id: self.session_id.clone(),
            chunks_acknowledged: self.chunks_acknowledged(),
            total_chunks: self.total_chunks,
            bytes_transferred: self.bytes_transferred.load(Ordering::Acquire),
            total_size: self.total_size,
        }
    }

    fn flag(&self, index: u32) -> Option<&AtomicBool> {
        let slot = usize::try_from(index.checked_sub(1)?).ok()?;
        self.acknowledged.get(slot)
    }
}

/// Sending half of a session's event stream.
///
/// Goes silent once the session is cancelled. `finish` consumes the
/// reporter, so a session can deliver at most one terminal event.
pub struct ProgressReporter {
    events: mpsc::UnboundedSender<UploadEvent>,
    cancel: CancellationToken,
}

impl ProgressReporter {
    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events, cancel }, rx)
    }

    pub fn progress(&self, event: ProgressEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // A dropped receiver means nobody is listening; the session goes on.
        let _ = self.events.send(UploadEvent::Progress(event));
    }

    /// Delivers the terminal event. Returns whether it was delivered.
    pub fn finish(self, outcome: Outcome) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.events.send(UploadEvent::Finished(outcome)).is_ok()
    }
}

/// Everything needed to re-attach to a session that did not finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub session_id: String,
    /// Chunks that need not be sent again.
    pub acknowledged: Vec<u32>,
}

impl ResumePoint {
    /// Re-attach by id alone and let chunk probing find what the server has.
    pub fn from_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            acknowledged: Vec::new(),
        }
    }
}

/// Caller-owned handle to a running upload session.
///
/// Yields the session's events as a [`Stream`]. Dropping the handle cancels
/// the session.
pub struct UploadHandle {
    session_id: String,
    state: Arc<SessionState>,
    events: mpsc::UnboundedReceiver<UploadEvent>,
    cancel: CancellationToken,
    local_md5: Option<String>,
}

impl UploadHandle {
    pub(crate) fn new(
        state: Arc<SessionState>,
        events: mpsc::UnboundedReceiver<UploadEvent>,
        cancel: CancellationToken,
        local_md5: Option<String>,
    ) -> Self {
        Self {
            session_id: state.session_id.clone(),
            state,
            events,
            cancel,
            local_md5,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// MD5 of the source file, when checksum verification is on.
    pub fn local_md5(&self) -> Option<&str> {
        self.local_md5.as_deref()
    }

    pub fn chunks_acknowledged(&self) -> u32 {
        self.state.chunks_acknowledged()
    }

    pub fn progress(&self) -> ProgressEvent {
        self.state.snapshot()
    }

    /// Stops dispatching chunks. Idempotent. Chunks already acknowledged by
    /// the server stay there; in-flight results are discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn resume_point(&self) -> ResumePoint {
        ResumePoint {
            session_id: self.session_id.clone(),
            acknowledged: self.state.acknowledged_indices(),
        }
    }

    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }
}

impl Stream for UploadHandle {
    type Item = UploadEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
