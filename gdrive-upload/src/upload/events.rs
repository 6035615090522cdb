use std::io;
use std::path::PathBuf;

use gdrive_core::{DriveError, DriveFile};
use thiserror::Error;
use tokio::sync::mpsc;

use super::session::SessionError;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session initiation failed: {0}")]
    Initiate(#[source] DriveError),
    #[error("streaming from offset {offset} failed: {source}")]
    Stream {
        offset: u64,
        #[source]
        source: DriveError,
    },
    #[error("gave up after {attempts} failed attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<UploadError>,
    },
    #[error("upload cancelled")]
    Cancelled,
    #[error("upload task ended abnormally: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl UploadError {
    /// Whether another attempt could succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Initiate(source) | UploadError::Stream { source, .. } => {
                source.is_retryable()
            }
            _ => false,
        }
    }
}

/// Non-terminal notifications emitted while an upload runs.
#[derive(Debug)]
pub enum UploadEvent {
    Progress(String),
    /// An attempt failed and will be retried.
    Error(UploadError),
}

/// Terminal success: the body returned by the final streaming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub body: String,
}

impl UploadedFile {
    pub fn new(body: String) -> Self {
        Self { body }
    }

    pub fn file_id(&self) -> Option<String> {
        serde_json::from_str::<DriveFile>(&self.body)
            .ok()
            .map(|file| file.id)
    }
}

/// Sending half for [`UploadEvent`]s. Nothing is sent when no one listens.
#[derive(Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::UnboundedSender<UploadEvent>>) -> Self {
        Self { tx }
    }

    pub(crate) fn progress(&self, message: impl Into<String>) {
        self.send(UploadEvent::Progress(message.into()));
    }

    pub(crate) fn error(&self, err: UploadError) {
        self.send(UploadEvent::Error(err));
    }

    fn send(&self, event: UploadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
