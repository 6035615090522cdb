use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub(crate) const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const FILES_PATH: &str = "/drive/v3/files";
const LIST_PAGE_SIZE: &str = "50";
const LIST_FIELDS: &str = "nextPageToken, files(id, name)";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("session response ({status}) carried no location header")]
    MissingSessionLocation { status: StatusCode },
    #[error("session location is not a valid url: {0}")]
    InvalidSessionLocation(String),
    #[error("unparseable range header: {0:?}")]
    InvalidRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Lists up to 50 files that are not folders.
    pub async fn list_files(&self) -> Result<FileList, DriveError> {
        self.list(&format!("mimeType != '{FOLDER_MIME_TYPE}'")).await
    }

    /// Lists up to 50 folders.
    pub async fn list_folders(&self) -> Result<FileList, DriveError> {
        self.list(&format!("mimeType = '{FOLDER_MIME_TYPE}'")).await
    }

    pub async fn create_folder(&self, name: &str) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint(FILES_PATH)?;
        url.query_pairs_mut().append_pair("fields", "id");
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&FileMetadata::folder(name))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn list(&self, q: &str) -> Result<FileList, DriveError> {
        let mut url = self.endpoint(FILES_PATH)?;
        url.query_pairs_mut()
            .append_pair("q", q)
            .append_pair("pageSize", LIST_PAGE_SIZE)
            .append_pair("fields", LIST_FIELDS);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        bearer(&self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(api_error(response).await)
        }
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub(crate) async fn api_error(response: reqwest::Response) -> DriveError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    DriveError::Api { status, body }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DriveError::Request(_)
            | DriveError::MissingSessionLocation { .. }
            | DriveError::InvalidSessionLocation(_) => true,
            _ => matches!(
                self.classification(),
                Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
            ),
        }
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::PERMANENT_REDIRECT
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

/// Properties of the object created on the remote side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parents.push(parent_id.into());
        self
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
