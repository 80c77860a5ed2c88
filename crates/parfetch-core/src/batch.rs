//! Batch driver: fan a list of URLs out under the configured strategy and
//! account for exactly one result per URL.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::fetch::FetchOptions;
use crate::strategy::{self, StrategyKind, WorkerCommand};

/// Terminal outcome of one URL's fetch-and-save. Serializable because it is
/// also the wire format between the process-pool parent and its workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchResult {
    Success {
        filename: String,
        bytes: u64,
        elapsed: Duration,
    },
    Failure {
        url: String,
        reason: String,
    },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }
}

/// Aggregate of one batch run: all per-URL results in arrival order plus
/// total wall-clock time. Lives only for the invocation that produced it.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<FetchResult>,
    pub total_elapsed: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub strategy: StrategyKind,
    /// Pool size for threaded/process; `None` means one worker per core.
    pub workers: Option<usize>,
    pub fetch: FetchOptions,
    /// Command to spawn for each unit of work under the process strategy
    /// (normally the parfetch binary in worker mode).
    pub worker_command: Option<WorkerCommand>,
}

/// Fetches every URL under the selected strategy, waits for all of them, and
/// returns one `FetchResult` per URL (arrival order) plus total elapsed time.
///
/// Per-item failures never abort siblings and never surface as `Err`; the
/// only errors here are unusable inputs (empty list, process strategy without
/// a worker command).
pub fn fetch_batch(urls: &[String], opts: &BatchOptions) -> Result<RunReport> {
    if urls.is_empty() {
        anyhow::bail!("no URLs given: a batch needs at least one");
    }

    let workers = opts.workers.unwrap_or_else(strategy::default_workers).max(1);
    let start = Instant::now();

    let results = match opts.strategy {
        StrategyKind::ThreadPool => strategy::threaded::run(urls, workers, &opts.fetch),
        StrategyKind::ProcessPool => {
            let cmd = opts
                .worker_command
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("process strategy needs a worker command"))?;
            strategy::process::run(urls, workers, cmd, &opts.fetch)
        }
        StrategyKind::Cooperative => strategy::cooperative::run(urls, &opts.fetch),
    };

    let total_elapsed = start.elapsed();
    debug_assert_eq!(results.len(), urls.len(), "one result per URL");

    let report = RunReport {
        results,
        total_elapsed,
    };
    tracing::info!(
        strategy = %opts.strategy,
        succeeded = report.succeeded(),
        failed = report.failed(),
        total_secs = total_elapsed.as_secs_f64(),
        "batch finished"
    );
    Ok(report)
}
