//! The `upload` command: drives one session and prints its events.
//! Ctrl-C cancels the session and prints how to resume it.

use anyhow::{Context, Result};
use std::path::Path;

use crate::{
    errors::UploadError,
    handlers::record_handlers::describe,
    models::event::ProgressEvent,
    services::{progress::ResumePoint, session::Uploader},
};

pub async fn upload(uploader: &Uploader, path: &Path, resume: Option<String>) -> Result<()> {
    let started = match resume {
        Some(id) => uploader.resume(path, ResumePoint::from_session_id(id)).await,
        None => uploader.start(path).await,
    };
    let mut handle = started.with_context(|| format!("starting upload of {}", path.display()))?;
    let session_id = handle.session_id().to_string();
    println!("session {session_id}");

    let result = tokio::select! {
        result = uploader.complete(&mut handle, print_progress) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(session = %session_id, "interrupted, cancelling upload");
            handle.cancel();
            uploader.complete(&mut handle, print_progress).await
        }
    };

    match result {
        Ok(record) => {
            println!("{}", describe(&record));
            Ok(())
        }
        Err(UploadError::Cancelled(_)) => {
            println!(
                "cancelled with {} of {} chunks on the server; resume with `upload {} --resume {}`",
                handle.chunks_acknowledged(),
                handle.progress().total_chunks,
                path.display(),
                handle.resume_point().session_id
            );
            Ok(())
        }
        Err(
            err @ (UploadError::RecordNotAvailable { .. } | UploadError::ChecksumMismatch { .. }),
        ) => Err(anyhow::Error::new(err).context(format!("resolving upload record {session_id}"))),
        Err(err) => Err(anyhow::Error::new(err).context(format!(
            "upload failed; resume with `upload {} --resume {session_id}`",
            path.display()
        ))),
    }
}

fn print_progress(progress: &ProgressEvent) {
    println!("{}", progress_line(progress));
}

fn progress_line(progress: &ProgressEvent) -> String {
    format!(
        "{:>5.1}%  {}/{} chunks  {}/{} bytes",
        progress.fraction() * 100.0,
        progress.chunks_acknowledged,
        progress.total_chunks,
        progress.bytes_transferred,
        progress.total_size
    )
}
