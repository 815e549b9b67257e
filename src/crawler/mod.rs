//! Crawler module for authenticated pagination
//!
//! This module contains the core crawling logic, including:
//! - Page fetching through the authenticated session with retries
//! - Record and next-page extraction from listing markup
//! - The crawl controller driving login and pagination

mod controller;
mod extractor;
mod fetcher;

pub use controller::{CrawlController, CrawlReport};
pub use extractor::{ExtractedPage, Extractor, QuoteExtractor};
pub use fetcher::PageFetcher;

use crate::config::Config;
use crate::state::{AbortReason, CrawlState};
use crate::{HarvestError, Result};
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build a fresh HTTP session for the configured site
/// 2. Log in with the given credentials
/// 3. Walk the listing and extract every record
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `username` - Login name
/// * `password` - Login password
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Login succeeded; the report holds every record
///   gathered, possibly partial with an abort reason
/// * `Err(HarvestError)` - Login never succeeded
pub async fn run_crawl(config: &Config, username: &str, password: &str) -> Result<CrawlReport> {
    run_crawl_with_cancellation(config, username, password, CancellationToken::new()).await
}

/// Same as `run_crawl`, stopping before the next fetch once `cancel` fires
pub async fn run_crawl_with_cancellation(
    config: &Config,
    username: &str,
    password: &str,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    let mut controller = CrawlController::from_config(config, cancel)?;
    let report = controller.run(username, password).await?;

    match (&report.state, &report.abort_reason) {
        (CrawlState::Failed, Some(reason)) => Err(login_error(reason)),
        _ => Ok(report),
    }
}

/// Maps the abort reason of a failed login to the error `run_crawl` reports
pub(crate) fn login_error(reason: &AbortReason) -> HarvestError {
    match reason {
        AbortReason::LoginRejected => HarvestError::LoginRejected,
        AbortReason::LoginStructure(msg) => HarvestError::AuthenticationStructure(msg.clone()),
        AbortReason::LoginFailed(msg) => HarvestError::LoginFailed(msg.clone()),
        AbortReason::Cancelled => HarvestError::Cancelled,
        other => HarvestError::LoginFailed(other.to_string()),
    }
}
