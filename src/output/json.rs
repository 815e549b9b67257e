//! JSON export of harvested records

use crate::crawler::CrawlReport;
use crate::record::Record;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Document written by `write_json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestExport {
    pub exported_at: String,

    /// False when the crawl stopped before the last page
    pub complete: bool,

    pub abort_reason: Option<String>,

    pub pages_visited: u32,

    pub records: Vec<Record>,
}

impl HarvestExport {
    pub fn from_report(report: &CrawlReport) -> Self {
        Self {
            exported_at: Utc::now().to_rfc3339(),
            complete: report.is_complete(),
            abort_reason: report.abort_reason.as_ref().map(|r| r.to_string()),
            pages_visited: report.pages_visited,
            records: report.records.clone(),
        }
    }
}

/// Writes the records of a crawl to `path` as pretty-printed JSON
///
/// # Returns
///
/// * `Ok(())` - The file was written
/// * `Err(HarvestError)` - The file could not be created or written
pub fn write_json(report: &CrawlReport, path: &Path) -> Result<()> {
    let export = HarvestExport::from_report(report);

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &export)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!(
        "Exported {} quotes to {}",
        export.records.len(),
        path.display()
    );
    Ok(())
}

/// Reads a document previously written by `write_json`
pub fn read_json(path: &Path) -> Result<HarvestExport> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
