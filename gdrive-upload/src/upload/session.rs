use std::fmt;
use std::path::{Path, PathBuf};

use gdrive_core::FileMetadata;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session location is already set")]
    AlreadyInitiated,
    #[error("invalid upload state transition {from:?} -> {to:?}")]
    InvalidTransition { from: UploadState, to: UploadState },
}

/// Number of additional attempts allowed after the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    Unlimited,
    Limited(u32),
}

impl RetryBudget {
    /// Negative values mean unlimited retries.
    pub fn from_signed(value: i64) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    /// Signed view of the budget, `-1` when unlimited.
    pub fn remaining(&self) -> i64 {
        match self {
            Self::Unlimited => -1,
            Self::Limited(left) => i64::from(*left),
        }
    }

    /// Takes one retry from the budget, returning `false` once it is spent.
    pub fn try_consume(&mut self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(0) => false,
            Self::Limited(left) => {
                *left -= 1;
                true
            }
        }
    }
}

impl From<i64> for RetryBudget {
    fn from(value: i64) -> Self {
        Self::from_signed(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Initiating,
    Streaming,
    Probing,
    Succeeded,
    Failed,
}

impl UploadState {
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Idle, Initiating)
                | (Idle, Failed)
                | (Initiating, Initiating)
                | (Initiating, Streaming)
                | (Initiating, Failed)
                | (Streaming, Probing)
                | (Streaming, Succeeded)
                | (Streaming, Failed)
                | (Probing, Streaming)
                | (Probing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Succeeded | UploadState::Failed)
    }
}

/// Everything the caller supplies to start an upload.
#[derive(Clone)]
pub struct UploadRequest {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub mime_type: String,
    pub metadata: FileMetadata,
    pub bearer_token: String,
    /// Negative means retry forever.
    pub retry_budget: i64,
}

/// State of a single upload, owned by the task driving it.
pub struct TransferSession {
    file_path: PathBuf,
    file_size: u64,
    mime_type: String,
    metadata: FileMetadata,
    bearer_token: String,
    session_url: Option<Url>,
    bytes_sent: u64,
    retries: RetryBudget,
    state: UploadState,
}

impl TransferSession {
    pub fn new(request: UploadRequest) -> Self {
        Self {
            file_path: request.file_path,
            file_size: request.file_size,
            mime_type: request.mime_type,
            metadata: request.metadata,
            bearer_token: request.bearer_token,
            session_url: None,
            bytes_sent: 0,
            retries: RetryBudget::from_signed(request.retry_budget),
            state: UploadState::Idle,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    pub fn session_url(&self) -> Option<&Url> {
        self.session_url.as_ref()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.file_size - self.bytes_sent
    }

    pub fn retries(&self) -> RetryBudget {
        self.retries
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub(crate) fn set_session_url(&mut self, url: Url) -> Result<(), SessionError> {
        if self.session_url.is_some() {
            return Err(SessionError::AlreadyInitiated);
        }
        self.session_url = Some(url);
        Ok(())
    }

    /// Applies the offset confirmed by a recovery probe.
    ///
    /// Anything missing or past the end of the file restarts from zero.
    pub(crate) fn apply_resume_offset(&mut self, confirmed: Option<u64>) -> u64 {
        self.bytes_sent = confirmed
            .filter(|offset| *offset <= self.file_size)
            .unwrap_or(0);
        self.bytes_sent
    }

    pub(crate) fn consume_retry(&mut self) -> bool {
        self.retries.try_consume()
    }

    pub(crate) fn transition(&mut self, next: UploadState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("file_path", &self.file_path)
            .field("file_size", &self.file_size)
            .field("mime_type", &self.mime_type)
            .field("metadata", &self.metadata)
            .field("bearer_token", &"<redacted>")
            .field("session_url", &self.session_url)
            .field("bytes_sent", &self.bytes_sent)
            .field("retries", &self.retries)
            .field("state", &self.state)
            .finish()
    }
}
