//! Page fetcher
//!
//! Fetches listing pages through an authenticated session:
//! - Refuses to fetch when the session fails its liveness probe
//! - Retries transport failures with the shared backoff policy
//! - Reports exhausted retries as `FetchFailed` for the requested URL

use crate::retry::{self, RetryPolicy};
use crate::session::{SessionManager, Transport};
use crate::{HarvestError, Result};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Fetches pages through a borrowed session
pub struct PageFetcher<'a, T: Transport> {
    session: &'a SessionManager<T>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<'a, T: Transport> PageFetcher<'a, T> {
    pub fn new(session: &'a SessionManager<T>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            session,
            retry,
            cancel,
        }
    }

    /// Fetches the markup of `url`
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The page body
    /// * `Err(HarvestError::Unauthenticated)` - The session probe failed; no
    ///   request for `url` was made
    /// * `Err(HarvestError::FetchFailed)` - Retries were exhausted
    /// * `Err(HarvestError::Cancelled)` - Cancelled while waiting to retry
    pub async fn fetch(&self, url: &Url) -> Result<String> {
        if !self.session.is_authenticated().await {
            return Err(HarvestError::Unauthenticated {
                url: url.to_string(),
            });
        }

        tracing::debug!("Fetching {}", url);
        retry::execute(
            || self.session.transport().get(url),
            &self.retry,
            "Fetch page",
            &self.cancel,
        )
        .await
        .map_err(|e| match e {
            HarvestError::Cancelled => HarvestError::Cancelled,
            other => HarvestError::FetchFailed {
                url: url.to_string(),
                source: Box::new(other),
            },
        })
    }
}
