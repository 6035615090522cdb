use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::UploadConfig;

use super::backoff::Backoff;
use super::events::{EventSink, UploadError, UploadEvent, UploadedFile};
use super::initiator;
use super::prober;
use super::session::{TransferSession, UploadRequest, UploadState};
use super::streamer::{self, StreamFailure};
use super::transport::UploadTransport;

/// Drives one file through initiate, stream, probe and retry.
pub struct ResumableUpload<T> {
    transport: T,
    session: TransferSession,
    probe_interval: Duration,
    backoff: Backoff,
    cancel: CancellationToken,
    failures: u32,
}

impl<T: UploadTransport> ResumableUpload<T> {
    pub fn new(transport: T, request: UploadRequest, config: &UploadConfig) -> Self {
        Self {
            transport,
            session: TransferSession::new(request),
            probe_interval: config.probe_interval,
            backoff: config.retry_backoff,
            cancel: CancellationToken::new(),
            failures: 0,
        }
    }

    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    /// Cancelling drops every outstanding request and the progress timer.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the upload on its own task.
    pub fn spawn(self) -> UploadHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            let mut upload = self;
            upload.run(Some(tx)).await
        });
        UploadHandle {
            events: rx,
            cancel,
            task,
        }
    }

    /// Runs the upload to its terminal outcome.
    ///
    /// Progress and retried failures go to `events`; the returned value is the
    /// single terminal success or failure.
    pub async fn run(
        &mut self,
        events: Option<mpsc::UnboundedSender<UploadEvent>>,
    ) -> Result<UploadedFile, UploadError> {
        let sink = EventSink::new(events);
        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            outcome = self.drive(&sink) => outcome,
        };

        match &outcome {
            Ok(_) => info!(
                file = %self.session.file_path().display(),
                size = self.session.file_size(),
                "upload complete"
            ),
            Err(err) => {
                warn!(
                    file = %self.session.file_path().display(),
                    error = %err,
                    "upload failed"
                );
                if !self.session.state().is_terminal() {
                    self.session.transition(UploadState::Failed)?;
                }
            }
        }
        outcome
    }

    async fn drive(&mut self, sink: &EventSink) -> Result<UploadedFile, UploadError> {
        self.session.transition(UploadState::Initiating)?;
        let session_url = loop {
            match initiator::open_session(&self.transport, &self.session).await {
                Ok(url) => break url,
                Err(err) => {
                    self.retry_or_fail(UploadError::Initiate(err), sink).await?;
                    self.session.transition(UploadState::Initiating)?;
                }
            }
        };
        self.session.set_session_url(session_url.clone())?;
        info!(session = %session_url, "resumable upload session started");
        sink.progress("Resumable upload session started");

        self.session.transition(UploadState::Streaming)?;
        loop {
            let offset = self.session.bytes_sent();
            let attempt = streamer::stream_attempt(
                &self.transport,
                &self.session,
                &session_url,
                self.probe_interval,
                sink,
            )
            .await;
            match attempt {
                Ok(body) => {
                    self.session.transition(UploadState::Succeeded)?;
                    return Ok(UploadedFile::new(body));
                }
                Err(StreamFailure::Local(source)) => {
                    return Err(UploadError::LocalIo {
                        path: self.session.file_path().to_path_buf(),
                        source,
                    });
                }
                Err(StreamFailure::Remote(source)) => {
                    self.retry_or_fail(UploadError::Stream { offset, source }, sink)
                        .await?;
                    self.session.transition(UploadState::Probing)?;
                    let confirmed = prober::recover_offset(
                        &self.transport,
                        &session_url,
                        self.session.bearer_token(),
                        self.session.file_size(),
                    )
                    .await;
                    let resume_at = self.session.apply_resume_offset(confirmed);
                    info!(offset = resume_at, "resuming upload");
                    self.session.transition(UploadState::Streaming)?;
                }
            }
        }
    }

    /// Spends one retry on `err`, or returns the terminal error.
    async fn retry_or_fail(
        &mut self,
        err: UploadError,
        sink: &EventSink,
    ) -> Result<(), UploadError> {
        self.failures = self.failures.saturating_add(1);
        if !err.is_retryable() {
            return Err(err);
        }
        if !self.session.consume_retry() {
            return Err(UploadError::Exhausted {
                attempts: self.failures,
                last: Box::new(err),
            });
        }
        warn!(
            error = %err,
            failures = self.failures,
            retries_remaining = self.session.retries().remaining(),
            "upload attempt failed, retrying"
        );
        sink.error(err);
        sink.progress("Retrying ...");

        let delay = self.backoff.delay(self.failures - 1);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// A spawned upload: its event stream, cancellation, and terminal outcome.
pub struct UploadHandle {
    events: mpsc::UnboundedReceiver<UploadEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<UploadedFile, UploadError>>,
}

impl UploadHandle {
    /// Next event, or `None` once the upload has finished.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn outcome(self) -> Result<UploadedFile, UploadError> {
        self.task.await?
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
