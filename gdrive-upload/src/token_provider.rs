use std::future::Future;
use std::time::{Duration, SystemTime};

use gdrive_core::{OAuthClient, OAuthError, OAuthToken};
use thiserror::Error;
use tracing::debug;

const REFRESH_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TokenProviderError {
    #[error("access token expired and no oauth client is configured")]
    MissingOAuthClient,
    #[error("access token expired and no refresh token is available")]
    MissingRefreshToken,
    #[error("refresh token was revoked or expired, authorize again")]
    Revoked(#[source] OAuthError),
    #[error("oauth refresh failed: {0}")]
    OAuth(OAuthError),
}

impl From<OAuthError> for TokenProviderError {
    fn from(err: OAuthError) -> Self {
        if err.is_invalid_grant() {
            TokenProviderError::Revoked(err)
        } else {
            TokenProviderError::OAuth(err)
        }
    }
}

/// Supplies a bearer token on demand.
pub trait Authenticator {
    fn bearer_token(&mut self) -> impl Future<Output = Result<String, TokenProviderError>> + Send;
}

/// A token handed over as-is, never refreshed.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl Authenticator for StaticToken {
    async fn bearer_token(&mut self) -> Result<String, TokenProviderError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// `None` means the token never expires.
    pub expires_at: Option<SystemTime>,
}

impl AccessToken {
    fn from_grant(token: &OAuthToken, now: SystemTime) -> Self {
        Self {
            value: token.access_token.clone(),
            expires_at: token
                .expires_in
                .map(|secs| now + Duration::from_secs(secs)),
        }
    }

    fn is_fresh(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(deadline) => now + REFRESH_SKEW < deadline,
            None => true,
        }
    }
}

/// Caches an access token and refreshes it through Google's token endpoint.
pub struct TokenProvider {
    client: Option<OAuthClient>,
    refresh_token: Option<String>,
    cached: Option<AccessToken>,
}

impl TokenProvider {
    /// Starts with no access token; the first request refreshes.
    pub fn from_refresh_token(client: OAuthClient, refresh_token: impl Into<String>) -> Self {
        Self {
            client: Some(client),
            refresh_token: Some(refresh_token.into()),
            cached: None,
        }
    }

    pub fn with_access_token(token: AccessToken) -> Self {
        Self {
            client: None,
            refresh_token: None,
            cached: Some(token),
        }
    }

    pub fn cached(&self) -> Option<&AccessToken> {
        self.cached.as_ref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub async fn valid_access_token(&mut self) -> Result<String, TokenProviderError> {
        let now = SystemTime::now();
        if let Some(token) = self.cached.as_ref().filter(|token| token.is_fresh(now)) {
            return Ok(token.value.clone());
        }
        self.refresh(now).await
    }

    async fn refresh(&mut self, now: SystemTime) -> Result<String, TokenProviderError> {
        let refresh_token = self
            .refresh_token
            .as_deref()
            .ok_or(TokenProviderError::MissingRefreshToken)?;
        let client = self
            .client
            .as_ref()
            .ok_or(TokenProviderError::MissingOAuthClient)?;

        let grant = client.refresh_token(refresh_token).await?;
        debug!(expires_in = ?grant.expires_in, "access token refreshed");
        if let Some(rotated) = grant.refresh_token.clone() {
            self.refresh_token = Some(rotated);
        }
        let token = AccessToken::from_grant(&grant, now);
        let value = token.value.clone();
        self.cached = Some(token);
        Ok(value)
    }
}

impl Authenticator for TokenProvider {
    async fn bearer_token(&mut self) -> Result<String, TokenProviderError> {
        self.valid_access_token().await
    }
}
