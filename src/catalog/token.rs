use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens closer than this to their declared expiry are refreshed
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Single-slot bearer token cache.
///
/// The read-check-refresh sequence runs under one lock, so concurrent callers
/// never issue duplicate token requests.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, or obtain a new one with `refresh`.
    ///
    /// `refresh` yields the token and its declared lifetime.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Duration), E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if Instant::now() + REFRESH_MARGIN < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let (token, lifetime) = refresh().await?;
        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token)
    }

    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }
}
