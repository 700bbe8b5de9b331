//! Spreadsheet (CSV) export of extraction results.

use crate::error::{AppError, Result};
use crate::models::{ExtractionResult, SocialPlatform};
use chrono::Utc;
use csv::Writer;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const EMPTY_HEADER: [&str; 6] = ["url", "domain", "emails", "phones", "social_media", "status"];
const BASE_COLUMNS: [&str; 5] = ["url", "domain", "emails", "phones", "status"];
const LIST_SEPARATOR: &str = ", ";

/// Builds the timestamped spreadsheet file name for a job.
pub fn result_file_name(job_id: &str) -> String {
    format!(
        "scrape_results_{}_{}.csv",
        Utc::now().format("%Y%m%d_%H%M%S"),
        job_id
    )
}

/// Writes results as CSV: one row per result, one column per social platform
/// that appears in any result.
pub fn write_results<W: Write>(results: &[ExtractionResult], writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    if results.is_empty() {
        wtr.write_record(EMPTY_HEADER)?;
        wtr.flush()?;
        return Ok(());
    }

    let platforms: BTreeSet<SocialPlatform> = results
        .iter()
        .flat_map(|r| r.social_media.keys().copied())
        .collect();

    let header = BASE_COLUMNS
        .iter()
        .copied()
        .chain(platforms.iter().map(SocialPlatform::as_str));
    wtr.write_record(header)?;

    for result in results {
        let mut row = vec![
            result.url.clone(),
            result.domain.clone(),
            result.emails.join(LIST_SEPARATOR),
            result.phones.join(LIST_SEPARATOR),
            result.status.to_string(),
        ];
        row.extend(
            platforms
                .iter()
                .map(|p| result.social_media.get(p).cloned().unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the results of a job into `dir` and returns the file path.
pub fn export_results(results: &[ExtractionResult], dir: &Path, job_id: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| {
        AppError::Export(format!("Cannot create results directory {}: {}", dir.display(), e))
    })?;

    let path = dir.join(result_file_name(job_id));
    debug!("Exporting {} results to CSV: {}", results.len(), path.display());

    let file = File::create(&path)
        .map_err(|e| AppError::Export(format!("Cannot create {}: {}", path.display(), e)))?;
    write_results(results, file)?;

    info!("Exported {} results to {}", results.len(), path.display());
    Ok(path)
}
