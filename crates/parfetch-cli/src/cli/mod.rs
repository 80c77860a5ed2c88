//! CLI for the parfetch batch fetcher.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use parfetch_core::batch::{self, BatchOptions, FetchResult, RunReport};
use parfetch_core::config;
use parfetch_core::fetch::{self, FetchOptions};
use parfetch_core::strategy::{StrategyKind, WorkerCommand};

/// Top-level CLI for parfetch.
#[derive(Debug, Parser)]
#[command(name = "parfetch")]
#[command(about = "parfetch: concurrent batch URL fetcher", long_about = None)]
pub struct Cli {
    /// URLs to download; each is saved under its last path segment.
    #[arg(value_name = "URL", required_unless_present = "worker_fetch")]
    pub urls: Vec<String>,

    /// Concurrency strategy: threaded, process, or async. Overrides the
    /// config file default.
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<StrategyKind>,

    /// Worker pool size for the threaded/process strategies (default: one
    /// worker per core).
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Destination directory for downloaded files (default: current
    /// directory).
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Exit with status 1 if any fetch failed (default: exit 0 and report).
    #[arg(long)]
    pub fail_on_error: bool,

    /// Worker mode for the process strategy: fetch one URL into the current
    /// directory and print the result as JSON.
    #[arg(long, hide = true, value_name = "URL", conflicts_with = "urls")]
    pub worker_fetch: Option<String>,
}

impl Cli {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let connect_timeout = cfg.connect_timeout_secs.map(Duration::from_secs);

        if let Some(url) = &cli.worker_fetch {
            return run_worker(url, connect_timeout);
        }

        let dest_dir = match &cli.dir {
            Some(d) => d.clone(),
            None => std::env::current_dir()?,
        };
        let opts = BatchOptions {
            strategy: cli.strategy.unwrap_or(cfg.strategy),
            workers: cli.workers.or(cfg.workers),
            fetch: FetchOptions {
                dest_dir,
                connect_timeout,
            },
            worker_command: Some(WorkerCommand {
                program: std::env::current_exe()?,
                args: vec!["--worker-fetch".to_string()],
            }),
        };

        let report = batch::fetch_batch(&cli.urls, &opts)?;
        print_report(&report);
        if cli.fail_on_error && report.failed() > 0 {
            anyhow::bail!(
                "{} of {} fetches failed",
                report.failed(),
                report.results.len()
            );
        }
        Ok(())
    }
}

/// Process-pool worker: one fetch into the CWD, result as a JSON line on
/// stdout. Always exits 0; the outcome travels in the JSON.
fn run_worker(url: &str, connect_timeout: Option<Duration>) -> Result<()> {
    let opts = FetchOptions {
        dest_dir: std::env::current_dir()?,
        connect_timeout,
    };
    let result = fetch::fetch_one(url, &opts);
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "  {:>7}  {:>10}  {:>8}  {}",
        "Outcome", "Bytes", "Time(s)", "File"
    );
    println!(
        "  {}  {}  {}  {}",
        "-------", "----------", "--------", "----"
    );
    for r in &report.results {
        match r {
            FetchResult::Success {
                filename,
                bytes,
                elapsed,
            } => println!(
                "  {:>7}  {:>10}  {:>8.2}  {}",
                "ok",
                bytes,
                elapsed.as_secs_f64(),
                filename
            ),
            FetchResult::Failure { url, reason } => {
                println!("  {:>7}  {:>10}  {:>8}  {} ({})", "failed", "-", "-", url, reason);
            }
        }
    }
    println!(
        "{} succeeded, {} failed in {:.2}s",
        report.succeeded(),
        report.failed(),
        report.total_elapsed.as_secs_f64()
    );
}
