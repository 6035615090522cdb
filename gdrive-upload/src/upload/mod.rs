//! Resumable upload engine.
//!
//! One upload is driven by a [`ResumableUpload`]: it opens a session, streams
//! the file from the last confirmed offset, and on failure asks the remote side
//! how much it kept before trying again within a shared retry budget.

pub mod backoff;
mod coordinator;
mod events;
mod initiator;
mod prober;
mod session;
mod streamer;
mod transport;

pub use coordinator::{ResumableUpload, UploadHandle};
pub use events::{UploadError, UploadEvent, UploadedFile};
pub use session::{RetryBudget, SessionError, TransferSession, UploadRequest, UploadState};
pub use transport::{SourceBody, UploadTransport};
