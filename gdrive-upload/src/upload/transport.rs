use std::future::Future;

use gdrive_core::{DriveError, FileMetadata, UploadClient};
use reqwest::Body;
use tokio::fs::File;
use tokio::io::Take;
use tokio_util::io::ReaderStream;
use url::Url;

/// File bytes from a resume offset through end of file.
pub struct SourceBody {
    reader: Take<File>,
    offset: u64,
    len: u64,
}

impl SourceBody {
    pub(crate) fn new(reader: Take<File>, offset: u64, len: u64) -> Self {
        Self {
            reader,
            offset,
            len,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_reader(self) -> Take<File> {
        self.reader
    }

    pub fn into_body(self) -> Body {
        Body::wrap_stream(ReaderStream::new(self.reader))
    }
}

/// The three requests of the resumable protocol.
pub trait UploadTransport: Send + Sync + 'static {
    /// Creates a session and returns its location.
    fn initiate(
        &self,
        token: &str,
        metadata: &FileMetadata,
        content_length: u64,
        content_type: &str,
    ) -> impl Future<Output = Result<Url, DriveError>> + Send;

    /// Streams `body` to the session, returning the final response body.
    fn send_bytes(
        &self,
        session_url: &Url,
        token: &str,
        body: SourceBody,
        content_type: &str,
    ) -> impl Future<Output = Result<String, DriveError>> + Send;

    /// Asks the session for the high bound of the bytes it holds.
    fn query_offset(
        &self,
        session_url: &Url,
        token: &str,
        total_size: u64,
    ) -> impl Future<Output = Result<Option<u64>, DriveError>> + Send;
}

impl UploadTransport for UploadClient {
    async fn initiate(
        &self,
        token: &str,
        metadata: &FileMetadata,
        content_length: u64,
        content_type: &str,
    ) -> Result<Url, DriveError> {
        self.start_session(token, metadata, content_length, content_type)
            .await
    }

    async fn send_bytes(
        &self,
        session_url: &Url,
        token: &str,
        body: SourceBody,
        content_type: &str,
    ) -> Result<String, DriveError> {
        let len = body.len();
        self.upload_bytes(session_url, token, body.into_body(), len, content_type)
            .await
    }

    async fn query_offset(
        &self,
        session_url: &Url,
        token: &str,
        total_size: u64,
    ) -> Result<Option<u64>, DriveError> {
        UploadClient::query_offset(self, session_url, token, total_size).await
    }
}
