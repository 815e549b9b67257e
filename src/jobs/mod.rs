//! Harvest jobs
//!
//! This module ties a crawl run to its persistence and exposes a small
//! trigger/status surface:
//! - `harvest` runs one crawl and stores its records and run outcome
//! - `JobRunner` spawns harvests on the tokio runtime and tracks their status

use crate::config::Config;
use crate::crawler::{login_error, CrawlController, CrawlReport};
use crate::state::{AbortReason, CrawlState};
use crate::storage::{RecordStore, RunStatus, SqliteStorage};
use crate::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identifier handed out by `JobRunner::submit`
pub type RunId = u64;

/// Status of a submitted harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    /// Login succeeded; the crawl may still have stopped early
    Succeeded {
        record_count: usize,
        abort_reason: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Outcome of one `harvest` call
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub report: CrawlReport,

    /// Run row written to the store, None when running without one
    pub stored_run: Option<i64>,

    /// Records written to the store
    pub saved: usize,

    /// Records the store refused
    pub skipped: usize,
}

/// Final run status for a crawl report
pub fn run_status_for(report: &CrawlReport) -> RunStatus {
    match (&report.state, &report.abort_reason) {
        (CrawlState::Failed, _) => RunStatus::Failed,
        (_, None) => RunStatus::Completed,
        (_, Some(AbortReason::Cancelled)) => RunStatus::Interrupted,
        (_, Some(_)) => RunStatus::Partial,
    }
}

/// Runs one crawl and persists its outcome
///
/// The run row is written even when login fails, so the store keeps a trace
/// of every attempt. Records the store refuses are logged and skipped.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash recorded on the run row
/// * `store` - Optional record store
/// * `cancel` - Stops the crawl before its next fetch or retry
///
/// # Returns
///
/// * `Ok(HarvestSummary)` - Login succeeded
/// * `Err(HarvestError)` - Login never succeeded, or the store failed
pub async fn harvest<S: RecordStore + Send>(
    config: &Config,
    config_hash: &str,
    username: &str,
    password: &str,
    store: Option<&tokio::sync::Mutex<S>>,
    cancel: CancellationToken,
) -> Result<HarvestSummary> {
    let mut controller = CrawlController::from_config(config, cancel)?;

    let stored_run = match store {
        Some(store) => {
            let run_id = store.lock().await.create_run(config_hash)?;
            tracing::info!("Started harvest run {}", run_id);
            Some(run_id)
        }
        None => None,
    };

    let report = controller.run(username, password).await?;

    let mut saved = 0;
    let mut skipped = 0;
    if let (Some(store), Some(run_id)) = (store, stored_run) {
        let mut store = store.lock().await;

        for record in &report.records {
            match store.save_record(record, run_id) {
                Ok(_) => saved += 1,
                Err(e) => {
                    tracing::warn!("Skipping record by {}: {}", record.author, e);
                    skipped += 1;
                }
            }
        }

        let reason = report.abort_reason.as_ref().map(|r| r.to_string());
        store.finish_run(
            run_id,
            run_status_for(&report),
            saved,
            reason.as_deref(),
        )?;
        tracing::info!("Run {} stored {} quotes ({} skipped)", run_id, saved, skipped);
    }

    if report.state == CrawlState::Failed {
        if let Some(reason) = &report.abort_reason {
            return Err(login_error(reason));
        }
    }

    Ok(HarvestSummary {
        report,
        stored_run,
        saved,
        skipped,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawns harvests and tracks their status in memory
///
/// Statuses are kept until `forget` is called for the job, so a long-lived
/// runner should forget jobs once their outcome has been read.
pub struct JobRunner<S: RecordStore + Send + 'static = SqliteStorage> {
    config: Arc<Config>,
    config_hash: Arc<str>,
    store: Option<Arc<tokio::sync::Mutex<S>>>,
    jobs: Arc<Mutex<HashMap<RunId, JobStatus>>>,
    handles: Mutex<HashMap<RunId, JoinHandle<()>>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

impl<S: RecordStore + Send + 'static> JobRunner<S> {
    /// Creates a runner that keeps records in memory only
    pub fn new(config: Config, config_hash: impl Into<String>) -> Self {
        Self {
            config: Arc::new(config),
            config_hash: Arc::from(config_hash.into()),
            store: None,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Persists every harvest into `store`
    pub fn with_store(mut self, store: S) -> Self {
        self.store = Some(Arc::new(tokio::sync::Mutex::new(store)));
        self
    }

    pub fn store(&self) -> Option<&Arc<tokio::sync::Mutex<S>>> {
        self.store.as_ref()
    }

    /// Starts a harvest on the tokio runtime
    ///
    /// Must be called from within a tokio runtime. The returned ID is
    /// immediately visible to `status` as `Pending`.
    pub fn submit(&self, username: impl Into<String>, password: impl Into<String>) -> RunId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.jobs).insert(id, JobStatus::Pending);

        let username = username.into();
        let password = password.into();
        let config = Arc::clone(&self.config);
        let config_hash = Arc::clone(&self.config_hash);
        let store = self.store.clone();
        let jobs = Arc::clone(&self.jobs);
        let cancel = self.cancel.child_token();

        tracing::info!("Submitted harvest job {}", id);
        let handle = tokio::spawn(async move {
            let outcome = harvest(
                &config,
                &config_hash,
                &username,
                &password,
                store.as_deref(),
                cancel,
            )
            .await;

            let status = match outcome {
                Ok(summary) => JobStatus::Succeeded {
                    record_count: summary.report.record_count(),
                    abort_reason: summary.report.abort_reason.map(|r| r.to_string()),
                },
                Err(e) => {
                    tracing::error!("Harvest job {} failed: {}", id, e);
                    JobStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            lock(&jobs).insert(id, status);
        });

        lock(&self.handles).insert(id, handle);
        id
    }

    /// Current status of a job, None for unknown IDs
    pub fn status(&self, id: RunId) -> Option<JobStatus> {
        lock(&self.jobs).get(&id).cloned()
    }

    /// Waits for a job to finish and returns its final status
    pub async fn wait(&self, id: RunId) -> Option<JobStatus> {
        let handle = lock(&self.handles).remove(&id);

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Harvest job {} did not finish: {}", id, e);
                lock(&self.jobs).insert(
                    id,
                    JobStatus::Failed {
                        reason: format!("job aborted: {}", e),
                    },
                );
            }
        }

        self.status(id)
    }

    /// Drops a finished job, returning its final status
    ///
    /// Pending and unknown jobs are left untouched and yield None.
    pub fn forget(&self, id: RunId) -> Option<JobStatus> {
        let mut jobs = lock(&self.jobs);
        if !jobs.get(&id).is_some_and(JobStatus::is_finished) {
            return None;
        }

        lock(&self.handles).remove(&id);
        jobs.remove(&id)
    }

    /// Cancels every running job and waits for all of them
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let ids: Vec<RunId> = lock(&self.handles).keys().copied().collect();
        for id in ids {
            self.wait(id).await;
        }
    }
}
