//! Concurrency strategies for fanning out a batch of fetches.
//!
//! All three expose the same contract: one `FetchResult` per input URL,
//! collected in arrival order, sibling failures isolated.

pub mod cooperative;
pub mod process;
pub mod threaded;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use process::WorkerCommand;

/// Which concurrency mechanism runs the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Fixed pool of worker threads sharing a queue of URLs.
    #[serde(rename = "threaded")]
    ThreadPool,
    /// Pool of isolated worker processes, one spawn per URL.
    #[serde(rename = "process")]
    ProcessPool,
    /// Single-threaded non-blocking event loop (curl multi).
    #[default]
    #[serde(rename = "async")]
    Cooperative,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ThreadPool => "threaded",
            StrategyKind::ProcessPool => "process",
            StrategyKind::Cooperative => "async",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threaded" => Ok(StrategyKind::ThreadPool),
            "process" => Ok(StrategyKind::ProcessPool),
            "async" => Ok(StrategyKind::Cooperative),
            other => Err(format!(
                "unknown strategy '{}' (expected threaded, process, or async)",
                other
            )),
        }
    }
}

/// Default pool size for the threaded and process strategies: one worker per
/// available core, with a floor of 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}
