//! Output module for harvest reports and exports
//!
//! This module handles:
//! - Exporting the records of a run as JSON
//! - Loading and printing statistics from the record store
//! - Printing the outcome of a single crawl

mod json;
pub mod stats;

pub use json::{read_json, write_json, HarvestExport};
pub use stats::{load_statistics, print_report, print_statistics, HarvestStatistics};
