//! Ambient service credentials for the platform API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::platform::PlatformError;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supplies OAuth bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, PlatformError>;
}

/// A fixed token, e.g. from `gcloud auth print-access-token`
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, PlatformError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl CachedToken {
    /// `None` when the reported lifetime cannot be represented; such tokens are not cached.
    fn new(token: String, expires_in: u64, now: Instant) -> Option<Self> {
        let lifetime = Duration::from_secs(expires_in).saturating_sub(EXPIRY_MARGIN);
        let refresh_at = now.checked_add(lifetime)?;
        Some(Self { token, refresh_at })
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Service account token from the GCE metadata server, cached until near expiry
pub struct MetadataServerToken {
    client: Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new(timeout: Duration) -> Result<Self, PlatformError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: METADATA_TOKEN_URL.to_owned(),
            cached: Mutex::new(None),
        })
    }

    async fn fetch(&self) -> Result<MetadataToken, PlatformError> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| PlatformError::Credentials(format!("metadata server unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Credentials(format!(
                "metadata server returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PlatformError::Credentials(format!("malformed token response: {e}")))
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn access_token(&self) -> Result<String, PlatformError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        debug!(expires_in = fresh.expires_in, "Fetched service account token");
        *cached = CachedToken::new(fresh.access_token.clone(), fresh.expires_in, Instant::now());
        if cached.is_none() {
            warn!(expires_in = fresh.expires_in, "Token lifetime out of range, not caching");
        }
        Ok(fresh.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_refreshes_a_minute_before_expiry() {
        let now = Instant::now();
        let cached = CachedToken::new("t".to_owned(), 3600, now).unwrap();

        assert!(cached.is_fresh(now + Duration::from_secs(3539)));
        assert!(!cached.is_fresh(now + Duration::from_secs(3540)));
    }

    #[test]
    fn short_lived_token_is_immediately_stale() {
        let now = Instant::now();
        let cached = CachedToken::new("t".to_owned(), 30, now).unwrap();
        assert!(!cached.is_fresh(now));
    }

    #[test]
    fn absurd_lifetime_is_not_cached() {
        assert!(CachedToken::new("t".to_owned(), u64::MAX, Instant::now()).is_none());
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let provider = StaticToken::new("ya29.static");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.static");
    }
}
