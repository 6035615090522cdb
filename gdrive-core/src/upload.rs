//! Resumable upload protocol: session creation, byte streaming and status probes.

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::{Body, Client, redirect};
use url::Url;

use crate::client::{DEFAULT_BASE_URL, DriveError, FileMetadata, api_error, bearer};

const UPLOAD_PATH: &str = "/upload/drive/v3/files";

#[derive(Clone)]
pub struct UploadClient {
    http: Client,
    base_url: Url,
}

impl UploadClient {
    pub fn new() -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, DriveError> {
        // Probe replies use 308 without a Location; they must not be followed.
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        Self::with_http(http, base_url)
    }

    pub fn with_http(http: Client, base_url: &str) -> Result<Self, DriveError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Opens a resumable session and returns its location.
    ///
    /// A response without a `Location` header is a failure whatever its status.
    pub async fn start_session(
        &self,
        token: &str,
        metadata: &FileMetadata,
        content_length: u64,
        content_type: &str,
    ) -> Result<Url, DriveError> {
        let mut url = self.base_url.join(UPLOAD_PATH)?;
        url.query_pairs_mut().append_pair("uploadType", "resumable");
        let body = serde_json::to_vec(metadata)?;
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, bearer(token))
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .header(CONTENT_LENGTH, body.len())
            .header("X-Upload-Content-Length", content_length)
            .header("X-Upload-Content-Type", content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .ok_or(DriveError::MissingSessionLocation { status })?;
        let location = location
            .to_str()
            .map_err(|_| DriveError::InvalidSessionLocation(format!("{location:?}")))?;
        response
            .url()
            .join(location)
            .map_err(|_| DriveError::InvalidSessionLocation(location.to_string()))
    }

    /// Streams `body` to the session and returns the response body on success.
    pub async fn upload_bytes(
        &self,
        session_url: &Url,
        token: &str,
        body: Body,
        content_length: u64,
        content_type: &str,
    ) -> Result<String, DriveError> {
        let response = self
            .http
            .put(session_url.clone())
            .header(AUTHORIZATION, bearer(token))
            .header(CONTENT_LENGTH, content_length)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(api_error(response).await)
        }
    }

    /// Asks the session how many bytes it holds.
    ///
    /// Returns the high bound of the reported range, or `None` when the reply
    /// carries no range at all.
    pub async fn query_offset(
        &self,
        session_url: &Url,
        token: &str,
        total_size: u64,
    ) -> Result<Option<u64>, DriveError> {
        let response = self
            .http
            .put(session_url.clone())
            .header(AUTHORIZATION, bearer(token))
            .header(CONTENT_LENGTH, 0)
            .header(CONTENT_RANGE, format!("bytes */{total_size}"))
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(api_error(response).await);
        }
        let Some(value) = response.headers().get(RANGE) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| DriveError::InvalidRange(format!("{value:?}")))?;
        parse_range_high(value)
            .map(Some)
            .ok_or_else(|| DriveError::InvalidRange(value.to_string()))
    }
}

/// Parses `<unit> <low>-<high>` (or `<unit>=<low>-<high>`) and returns `high`.
pub fn parse_range_high(value: &str) -> Option<u64> {
    let (_, range) = value.trim().split_once(|c| c == ' ' || c == '=')?;
    let (low, high) = range.trim().split_once('-')?;
    let low = low.trim().parse::<u64>().ok()?;
    let high = high.trim().parse::<u64>().ok()?;
    (low <= high).then_some(high)
}
