//! In-memory batch job tracking.
//!
//! Each job's state is written only through its [`JobHandle`], owned by the
//! task running the batch. Everyone else reads copied [`JobSnapshot`]s.

use crate::error::{AppError, Result};
use crate::export::export_results;
use crate::harvester::Harvester;
use crate::history::{JobHistory, JobRecord};
use crate::models::{ExtractionResult, JobStatus, ScrapeTarget};
use crate::processor::scrape_all;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Number of results included in a snapshot preview.
pub const PREVIEW_LEN: usize = 5;

#[derive(Debug)]
struct JobState {
    job_id: String,
    status: JobStatus,
    total_urls: usize,
    completed_urls: usize,
    results: Vec<ExtractionResult>,
    result_file: Option<PathBuf>,
    error: Option<String>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    user_id: Option<i64>,
}

type SharedJob = Arc<RwLock<JobState>>;

fn read(job: &SharedJob) -> RwLockReadGuard<'_, JobState> {
    job.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(job: &SharedJob) -> RwLockWriteGuard<'_, JobState> {
    job.write().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time copy of a job, as reported to callers.
#[derive(Serialize, Debug, Clone)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub total_urls: usize,
    pub completed_urls: usize,
    /// Percent complete, one decimal.
    pub progress: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds since start, or until end once the job is terminal.
    pub elapsed_time: f64,
    pub result_file: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_preview: Option<Vec<ExtractionResult>>,
    pub total_results: usize,
    pub user_id: Option<i64>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl JobState {
    fn new(job_id: String, total_urls: usize, user_id: Option<i64>) -> Self {
        Self {
            job_id,
            status: JobStatus::Initializing,
            total_urls,
            completed_urls: 0,
            results: Vec::new(),
            result_file: None,
            error: None,
            start_time: Utc::now(),
            end_time: None,
            user_id,
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        let progress = if self.total_urls == 0 {
            0.0
        } else {
            round1(self.completed_urls as f64 / self.total_urls as f64 * 100.0)
        };
        let until = self.end_time.unwrap_or_else(Utc::now);
        let elapsed_ms = (until - self.start_time).num_milliseconds().max(0);
        let result_preview = (!self.results.is_empty())
            .then(|| self.results.iter().take(PREVIEW_LEN).cloned().collect());

        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            total_urls: self.total_urls,
            completed_urls: self.completed_urls,
            progress,
            start_time: self.start_time,
            end_time: self.end_time,
            elapsed_time: round1(elapsed_ms as f64 / 1000.0),
            result_file: self
                .result_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            error: self.error.clone(),
            result_preview,
            total_results: self.results.len(),
            user_id: self.user_id,
        }
    }

    fn history_record(&self) -> JobRecord {
        JobRecord {
            job_id: self.job_id.clone(),
            user_id: self.user_id,
            total_urls: self.total_urls,
            successful_urls: self.results.iter().filter(|r| r.status.is_success()).count(),
            emails_found: self.results.iter().map(|r| r.emails.len()).sum(),
            status: self.status,
            result_file: self
                .result_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            created_at: self.start_time,
            completed_at: self.end_time,
        }
    }

    /// Terminal jobs are ordered by when they finished.
    fn finished_at(&self) -> Option<DateTime<Utc>> {
        if self.status.is_terminal() {
            Some(self.end_time.unwrap_or(self.start_time))
        } else {
            None
        }
    }
}

/// The single writer of a job's state.
#[derive(Debug)]
pub struct JobHandle {
    state: SharedJob,
}

impl JobHandle {
    pub fn job_id(&self) -> String {
        read(&self.state).job_id.clone()
    }

    pub fn start(&self) {
        write(&self.state).status = JobStatus::Running;
    }

    /// Appends a finished result and advances the progress counter.
    pub fn record(&self, result: ExtractionResult) {
        let mut state = write(&self.state);
        state.results.push(result);
        state.completed_urls += 1;
    }

    pub fn complete(&self, result_file: PathBuf) {
        let mut state = write(&self.state);
        state.result_file = Some(result_file);
        state.status = JobStatus::Completed;
        state.end_time = Some(Utc::now());
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut state = write(&self.state);
        state.error = Some(message.into());
        state.status = JobStatus::Error;
        state.end_time = Some(Utc::now());
    }

    pub fn results(&self) -> Vec<ExtractionResult> {
        read(&self.state).results.clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        read(&self.state).snapshot()
    }

    pub fn history_record(&self) -> JobRecord {
        read(&self.state).history_record()
    }
}

/// Table of all tracked jobs.
#[derive(Debug)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, SharedJob>>,
    ttl: Duration,
    max_jobs: usize,
}

/// `YYYYmmdd_HHMMSS_<8 hex>`, UTC.
pub fn new_job_id() -> String {
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("{}_{:08x}", Utc::now().format("%Y%m%d_%H%M%S"), suffix)
}

impl JobStore {
    pub fn new(ttl: Duration, max_jobs: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ttl,
            max_jobs: max_jobs.max(1),
        }
    }

    /// Registers a new job and hands back its writer.
    pub fn create(&self, total_urls: usize, user_id: Option<i64>) -> JobHandle {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut jobs);

        let mut job_id = new_job_id();
        while jobs.contains_key(&job_id) {
            tracing::debug!(target: "job_task", "Job id {} already taken, regenerating", job_id);
            job_id = new_job_id();
        }

        let state = Arc::new(RwLock::new(JobState::new(job_id.clone(), total_urls, user_id)));
        jobs.insert(job_id.clone(), Arc::clone(&state));
        tracing::info!(target: "job_task", "Created job {} with {} URLs", job_id, total_urls);

        JobHandle { state }
    }

    /// Drops expired terminal jobs, then the oldest terminal jobs while the
    /// table has no room for one more. Running jobs are never dropped.
    fn prune(&self, jobs: &mut HashMap<String, SharedJob>) {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        jobs.retain(|id, job| {
            let keep = read(job).finished_at().is_none_or(|at| now - at < ttl);
            if !keep {
                tracing::debug!(target: "job_task", "Evicting expired job {}", id);
            }
            keep
        });

        if jobs.len() < self.max_jobs {
            return;
        }
        let mut finished: Vec<(DateTime<Utc>, String)> = jobs
            .iter()
            .filter_map(|(id, job)| read(job).finished_at().map(|at| (at, id.clone())))
            .collect();
        finished.sort();

        let excess = jobs.len() + 1 - self.max_jobs;
        for (_, id) in finished.into_iter().take(excess) {
            tracing::debug!(target: "job_task", "Evicting job {} to stay within capacity", id);
            jobs.remove(&id);
        }
        if jobs.len() >= self.max_jobs {
            tracing::warn!(target: "job_task", "Job table holds {} running jobs, above the limit of {}", jobs.len(), self.max_jobs);
        }
    }

    fn get(&self, job_id: &str) -> Option<SharedJob> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        self.get(job_id).map(|job| read(&job).snapshot())
    }

    /// Snapshots of every tracked job, newest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let jobs: Vec<SharedJob> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut snapshots: Vec<JobSnapshot> = jobs.iter().map(|job| read(job).snapshot()).collect();
        snapshots.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| b.job_id.cmp(&a.job_id)));
        snapshots
    }

    /// Full results of a completed job.
    pub fn results(&self, job_id: &str) -> Result<Vec<ExtractionResult>> {
        let job = self
            .get(job_id)
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
        let state = read(&job);
        if state.status != JobStatus::Completed {
            return Err(AppError::ResultsNotReady(job_id.to_string()));
        }
        Ok(state.results.clone())
    }

    /// Spreadsheet of a completed job.
    pub fn result_file(&self, job_id: &str) -> Result<PathBuf> {
        let job = self
            .get(job_id)
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
        let state = read(&job);
        match (&state.status, &state.result_file) {
            (JobStatus::Completed, Some(path)) => Ok(path.clone()),
            _ => Err(AppError::ResultsNotReady(job_id.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a whole batch: scrape every target, export, and finalize the job.
///
/// Per-URL failures, including crashed scrape tasks, are just error rows. An
/// export failure puts the job into the error state with its results kept.
pub async fn run_job(
    handle: JobHandle,
    targets: Vec<ScrapeTarget>,
    harvester: Arc<Harvester>,
    workers: usize,
    results_dir: &Path,
    history: Arc<dyn JobHistory>,
) {
    let job_id = handle.job_id();
    handle.start();
    tracing::info!(target: "job_task", "Job {} running with {} URLs", job_id, targets.len());
    if let Err(e) = history.record_start(&handle.history_record()) {
        tracing::warn!(target: "job_task", "Failed to record start of job {}: {}", job_id, e);
    }

    scrape_all(harvester, targets, workers, |result| handle.record(result)).await;

    match export_results(&handle.results(), results_dir, &job_id) {
        Ok(path) => {
            tracing::info!(target: "job_task", "Job {} completed, results in {}", job_id, path.display());
            handle.complete(path);
        }
        Err(e) => {
            tracing::error!(target: "job_task", "Job {} failed: {}", job_id, e);
            handle.fail(e.to_string());
        }
    }

    if let Err(e) = history.record_finish(&handle.history_record()) {
        tracing::warn!(target: "job_task", "Failed to record end of job {}: {}", job_id, e);
    }
}
