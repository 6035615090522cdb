use std::io::{self, SeekFrom};
use std::path::Path;
use std::time::Duration;

use gdrive_core::DriveError;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};
use url::Url;

use super::events::EventSink;
use super::prober;
use super::session::TransferSession;
use super::transport::{SourceBody, UploadTransport};

pub(crate) enum StreamFailure {
    /// The source could not be opened at the requested offset.
    Local(io::Error),
    Remote(DriveError),
}

pub(crate) async fn open_source(path: &Path, offset: u64, len: u64) -> io::Result<SourceBody> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    Ok(SourceBody::new(file.take(len), offset, len))
}

/// One streaming attempt from `session.bytes_sent()` to end of file.
///
/// The periodic prober lives exactly as long as the request: both futures
/// are polled together and the prober is dropped when the request settles.
pub(crate) async fn stream_attempt<T: UploadTransport>(
    transport: &T,
    session: &TransferSession,
    session_url: &Url,
    probe_interval: Duration,
    events: &EventSink,
) -> Result<String, StreamFailure> {
    let offset = session.bytes_sent();
    let len = session.remaining_bytes();
    let body = open_source(session.file_path(), offset, len)
        .await
        .map_err(StreamFailure::Local)?;
    info!(offset, len, "streaming file");

    let upload = transport.send_bytes(
        session_url,
        session.bearer_token(),
        body,
        session.mime_type(),
    );
    let ticker = prober::report_progress(
        transport,
        session_url,
        session.bearer_token(),
        session.file_size(),
        probe_interval,
        events,
    );

    let result = tokio::select! {
        result = upload => result,
        never = ticker => match never {},
    };
    debug!(offset, ok = result.is_ok(), "streaming attempt finished");
    result.map_err(StreamFailure::Remote)
}
