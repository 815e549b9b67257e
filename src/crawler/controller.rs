//! Crawl controller - pagination loop and run lifecycle
//!
//! This module drives one crawl run:
//! - Logging in once before any page is requested
//! - Walking the listing page by page, following each page's "next" link
//! - Accumulating records in page-visit order
//! - Stopping gracefully on fetch failure, cancellation or configured limits
//!   while keeping everything extracted so far

use crate::config::{Config, CrawlConfig};
use crate::crawler::extractor::{Extractor, QuoteExtractor};
use crate::crawler::fetcher::PageFetcher;
use crate::record::Record;
use crate::retry::RetryPolicy;
use crate::session::{HttpTransport, SessionManager, Transport};
use crate::state::{AbortReason, CrawlState};
use crate::url::join_path;
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Outcome of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Final state, either `Completed` or `Failed`
    pub state: CrawlState,

    /// Records in page-visit order
    pub records: Vec<Record>,

    /// Pages successfully fetched and extracted
    pub pages_visited: u32,

    /// Quote blocks dropped for missing required fields
    pub records_dropped: usize,

    /// Why the run ended early, None if every page was walked
    pub abort_reason: Option<AbortReason>,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Returns true if the run walked the whole listing
    pub fn is_complete(&self) -> bool {
        self.state == CrawlState::Completed && self.abort_reason.is_none()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Records gathered by the pagination loop
struct PaginationOutcome {
    records: Vec<Record>,
    pages_visited: u32,
    records_dropped: usize,
    abort_reason: Option<AbortReason>,
}

/// Main crawl controller
///
/// Owns its session exclusively; concurrent crawls each need their own
/// controller.
pub struct CrawlController<T: Transport = HttpTransport, E: Extractor = QuoteExtractor> {
    session: SessionManager<T>,
    extractor: E,
    first_page: Url,
    fetch_retry: RetryPolicy,
    limits: CrawlConfig,
    cancel: CancellationToken,
    state: CrawlState,
}

impl CrawlController<HttpTransport, QuoteExtractor> {
    /// Builds a controller for the configured site with a fresh HTTP session
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let session = SessionManager::from_config(config)?;
        let extractor = QuoteExtractor::new(
            session.base_url().clone(),
            config.site.reference_domains.clone(),
        );
        let first_page = join_path(session.base_url(), &config.site.first_page_path)?;

        Ok(Self::new(
            session,
            extractor,
            first_page,
            RetryPolicy::from(&config.retry),
            config.crawl.clone(),
        )
        .with_cancellation(cancel))
    }
}

impl<T: Transport, E: Extractor> CrawlController<T, E> {
    /// Creates a controller in the `Idle` state
    ///
    /// # Arguments
    ///
    /// * `session` - Unauthenticated session to log in with
    /// * `extractor` - Turns each fetched page into records
    /// * `first_page` - Address of the first listing page
    /// * `fetch_retry` - Retry budget for each page fetch
    /// * `limits` - Optional page cap and deadline
    pub fn new(
        session: SessionManager<T>,
        extractor: E,
        first_page: Url,
        fetch_retry: RetryPolicy,
        limits: CrawlConfig,
    ) -> Self {
        Self {
            session,
            extractor,
            first_page,
            fetch_retry,
            limits,
            cancel: CancellationToken::new(),
            state: CrawlState::Idle,
        }
    }

    /// Uses `cancel` to stop the crawl before the next fetch or retry
    ///
    /// The session's login retries observe the same token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.session.set_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    fn transition(&mut self, next: CrawlState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!("Crawl state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs the crawl
    ///
    /// Login problems end the run in `Failed` with an empty record list and a
    /// reason; every other early stop ends in `Completed` with the records
    /// gathered so far and a reason.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run finished (see `state` and `abort_reason`)
    /// * `Err(HarvestError::InvalidTransition)` - The controller was already run
    pub async fn run(&mut self, username: &str, password: &str) -> Result<CrawlReport> {
        let start_time = Instant::now();

        self.transition(CrawlState::Authenticating)?;
        if let Some(reason) = self.authenticate(username, password).await {
            self.transition(CrawlState::Failed)?;
            tracing::error!("Login failed. Cannot proceed with scraping: {}", reason);

            return Ok(CrawlReport {
                state: self.state,
                records: Vec::new(),
                pages_visited: 0,
                records_dropped: 0,
                abort_reason: Some(reason),
                elapsed: start_time.elapsed(),
            });
        }

        self.transition(CrawlState::Crawling)?;
        tracing::info!("Starting the scraping process at {}", self.first_page);
        let outcome = self.crawl_pages(start_time).await;
        self.transition(CrawlState::Completed)?;

        match &outcome.abort_reason {
            Some(reason) => tracing::warn!(
                "Scraping stopped early ({}). Total quotes scraped: {}",
                reason,
                outcome.records.len()
            ),
            None => tracing::info!(
                "Scraping completed. Total quotes scraped: {} from {} pages",
                outcome.records.len(),
                outcome.pages_visited
            ),
        }

        Ok(CrawlReport {
            state: self.state,
            records: outcome.records,
            pages_visited: outcome.pages_visited,
            records_dropped: outcome.records_dropped,
            abort_reason: outcome.abort_reason,
            elapsed: start_time.elapsed(),
        })
    }

    /// Logs in, returning the abort reason on failure
    async fn authenticate(&mut self, username: &str, password: &str) -> Option<AbortReason> {
        match self.session.login(username, password).await {
            Ok(true) => None,
            Ok(false) => Some(AbortReason::LoginRejected),
            Err(e) => Some(match e.root_cause() {
                HarvestError::AuthenticationStructure(msg) => {
                    AbortReason::LoginStructure(msg.clone())
                }
                HarvestError::Cancelled => AbortReason::Cancelled,
                _ => AbortReason::LoginFailed(e.to_string()),
            }),
        }
    }

    /// Walks the listing from the first page until there is no next page
    async fn crawl_pages(&self, start_time: Instant) -> PaginationOutcome {
        let fetcher = PageFetcher::new(&self.session, self.fetch_retry, self.cancel.clone());
        let deadline = self.limits.deadline();

        let mut outcome = PaginationOutcome {
            records: Vec::new(),
            pages_visited: 0,
            records_dropped: 0,
            abort_reason: None,
        };
        let mut visited = HashSet::new();
        let mut current = Some(self.first_page.clone());

        while let Some(url) = current.take() {
            if self.cancel.is_cancelled() {
                tracing::info!("Crawl cancelled before fetching {}", url);
                outcome.abort_reason = Some(AbortReason::Cancelled);
                break;
            }

            if let Some(limit) = self.limits.page_limit() {
                if outcome.pages_visited >= limit {
                    tracing::info!("Page limit of {} reached", limit);
                    outcome.abort_reason = Some(AbortReason::PageLimitReached(limit));
                    break;
                }
            }

            if !visited.insert(url.clone()) {
                tracing::warn!("Pagination loops back to {}, stopping", url);
                break;
            }

            tracing::info!("Scraping page: {}", url);
            let fetched = match deadline {
                Some(budget) => {
                    let remaining = budget.saturating_sub(start_time.elapsed());
                    match tokio::time::timeout(remaining, fetcher.fetch(&url)).await {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::warn!("Crawl deadline of {:?} exceeded", budget);
                            outcome.abort_reason = Some(AbortReason::DeadlineExceeded);
                            break;
                        }
                    }
                }
                None => fetcher.fetch(&url).await,
            };

            let markup = match fetched {
                Ok(markup) => markup,
                Err(HarvestError::Cancelled) => {
                    outcome.abort_reason = Some(AbortReason::Cancelled);
                    break;
                }
                Err(e) => {
                    tracing::error!("Error scraping page {}: {}", url, e);
                    outcome.abort_reason = Some(AbortReason::FetchFailed {
                        url: url.to_string(),
                        reason: e.root_cause().to_string(),
                    });
                    break;
                }
            };

            let page = self.extractor.extract(&markup);
            tracing::debug!(
                "Extracted {} quotes from {} ({} dropped)",
                page.records.len(),
                url,
                page.dropped
            );

            outcome.pages_visited += 1;
            outcome.records_dropped += page.dropped;
            outcome.records.extend(page.records);
            current = page.next_page;
        }

        outcome
    }
}
