//! Job history persistence.

use crate::error::Result;
use crate::models::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One line of job history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub user_id: Option<i64>,
    pub total_urls: usize,
    pub successful_urls: usize,
    pub emails_found: usize,
    pub status: JobStatus,
    pub result_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Sink for job lifecycle records. Failures are the caller's to log.
pub trait JobHistory: Send + Sync {
    fn record_start(&self, record: &JobRecord) -> Result<()>;

    fn record_finish(&self, record: &JobRecord) -> Result<()>;
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NoopHistory;

impl JobHistory for NoopHistory {
    fn record_start(&self, _record: &JobRecord) -> Result<()> {
        Ok(())
    }

    fn record_finish(&self, _record: &JobRecord) -> Result<()> {
        Ok(())
    }
}

/// Appends records as JSON lines to a file.
#[derive(Debug)]
pub struct JsonlHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &JobRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Reads the file back, keeping the latest record of each job in first-seen order.
    pub fn load(&self) -> Result<Vec<JobRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);

        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, JobRecord> = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JobRecord>(&line) {
                Ok(record) => {
                    if !latest.contains_key(&record.job_id) {
                        order.push(record.job_id.clone());
                    }
                    latest.insert(record.job_id.clone(), record);
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed history line in {}: {}", self.path.display(), e);
                }
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| latest.remove(&id))
            .collect())
    }
}

impl JobHistory for JsonlHistory {
    fn record_start(&self, record: &JobRecord) -> Result<()> {
        self.append(record)
    }

    fn record_finish(&self, record: &JobRecord) -> Result<()> {
        self.append(record)
    }
}
