use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://oauth2.googleapis.com";
const TOKEN_PATH: &str = "/token";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid token endpoint: {0}")]
    Url(#[from] url::ParseError),
    /// Structured rejection, e.g. `invalid_grant` for a revoked refresh token.
    #[error("token endpoint rejected the grant ({status}): {error}")]
    Rejected {
        status: StatusCode,
        error: String,
        description: Option<String>,
    },
    #[error("token endpoint returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl OAuthError {
    /// True when the refresh token itself is no longer usable.
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, OAuthError::Rejected { error, .. } if error == "invalid_grant")
    }
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Installed-app OAuth client for Google's token endpoint.
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Self::with_base_url(DEFAULT_BASE_URL, client_id, client_secret)
    }

    pub fn with_base_url(
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        let token_url = Url::parse(base_url)?.join(TOKEN_PATH)?;
        Ok(Self {
            http: Client::new(),
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Trades a long-lived refresh token for a fresh access token.
    ///
    /// Google keeps the refresh token stable, so the reply usually omits it.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthToken, OAuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<OAuthToken>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<TokenErrorBody>(&body) {
            Ok(parsed) => OAuthError::Rejected {
                status,
                error: parsed.error,
                description: parsed.error_description,
            },
            Err(_) => OAuthError::Api { status, body },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}
