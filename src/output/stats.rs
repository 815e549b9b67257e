//! Statistics generation from the quote database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::crawler::CrawlReport;
use crate::storage::{RecordStore, RunRecord};
use crate::HarvestError;

/// Number of tags listed by `print_statistics`
const TOP_TAG_COUNT: usize = 10;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of distinct quotes stored
    pub total_quotes: u64,

    /// Total number of distinct tags stored
    pub total_tags: u64,

    /// Number of recorded runs
    pub total_runs: u64,

    /// Number of distinct authors
    pub unique_authors: u64,

    /// Most used tags with their quote counts
    pub top_tags: Vec<(String, u64)>,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn RecordStore) -> Result<HarvestStatistics, HarvestError> {
    let total_quotes = storage.count_records()?;
    let total_tags = storage.count_tags()?;
    let total_runs = storage.count_runs()?;
    let unique_authors = storage.author_breakdown()?.len() as u64;
    let top_tags = storage.top_tags(TOP_TAG_COUNT)?;
    let latest_run = storage.get_latest_run()?;

    Ok(HarvestStatistics {
        total_quotes,
        total_tags,
        total_runs,
        unique_authors,
        top_tags,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Quotes stored: {}", stats.total_quotes);
    println!("  Unique authors: {}", stats.unique_authors);
    println!("  Tags: {}", stats.total_tags);
    println!("  Runs recorded: {}", stats.total_runs);
    println!();

    if !stats.top_tags.is_empty() {
        println!("Top Tags:");
        for (tag, count) in &stats.top_tags {
            let percentage = if stats.total_quotes > 0 {
                (*count as f64 / stats.total_quotes as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", tag, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status.to_db_string());
            println!("  Quotes: {}", run.record_count);
            if let Some(reason) = &run.abort_reason {
                println!("  Stopped because: {}", reason);
            }
        }
        None => println!("No runs recorded yet."),
    }
}

/// Prints the outcome of a single crawl
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("  State: {}", report.state);
    println!("  Pages visited: {}", report.pages_visited);
    println!("  Quotes extracted: {}", report.record_count());
    if report.records_dropped > 0 {
        println!("  Malformed quotes dropped: {}", report.records_dropped);
    }
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());

    match &report.abort_reason {
        Some(reason) if reason.is_login_failure() => println!("  Login failed: {}", reason),
        Some(reason) => println!("  Stopped early: {}", reason),
        None => {}
    }
}
