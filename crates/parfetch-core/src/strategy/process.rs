//! Process-pool strategy: the pool shape matches the threaded strategy, but
//! each unit of work runs in an isolated OS process. The worker is the
//! parfetch binary in hidden worker mode; it fetches one URL into its working
//! directory and prints a JSON-encoded `FetchResult` on stdout.
//!
//! A worker that cannot be spawned, exits nonzero, or prints something that
//! does not decode still yields exactly one `Failure` for its URL.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::batch::FetchResult;
use crate::fetch::FetchOptions;

/// Program and leading arguments for one worker invocation; the URL is
/// appended as the final argument.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Runs the batch with up to `workers` worker processes in flight at once.
pub(crate) fn run(
    urls: &[String],
    workers: usize,
    cmd: &WorkerCommand,
    opts: &FetchOptions,
) -> Vec<FetchResult> {
    let count = urls.len();
    let work: Arc<Mutex<VecDeque<String>>> =
        Arc::new(Mutex::new(urls.iter().cloned().collect()));
    let (tx, rx) = mpsc::channel();

    let num_workers = workers.min(count).max(1);
    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let work = Arc::clone(&work);
        let tx = tx.clone();
        let cmd = cmd.clone();
        let opts = opts.clone();
        handles.push(std::thread::spawn(move || loop {
            let url = match work.lock().unwrap().pop_front() {
                Some(u) => u,
                None => break,
            };
            let _ = tx.send(run_worker(&cmd, &url, &opts));
        }));
    }
    drop(tx);

    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        let res = rx.recv().expect("worker result");
        results.push(res);
    }
    for h in handles {
        h.join()
            .unwrap_or_else(|e| panic!("worker panicked: {:?}", e));
    }
    results
}

/// Spawns one worker for `url`, waits for it, and decodes its stdout.
fn run_worker(cmd: &WorkerCommand, url: &str, opts: &FetchOptions) -> FetchResult {
    let output = Command::new(&cmd.program)
        .args(&cmd.args)
        .arg(url)
        .current_dir(&opts.dest_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output();

    let output = match output {
        Ok(o) => o,
        Err(e) => return failure(url, format!("worker spawn failed: {}", e)),
    };
    if !output.status.success() {
        return failure(url, format!("worker exited with {}", output.status));
    }
    decode_worker_stdout(url, &output.stdout)
}

/// Parses the last non-empty stdout line as a JSON `FetchResult`.
fn decode_worker_stdout(url: &str, stdout: &[u8]) -> FetchResult {
    let text = String::from_utf8_lossy(stdout);
    let line = match text.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(l) => l,
        None => return failure(url, "worker produced no output".to_string()),
    };
    match serde_json::from_str::<FetchResult>(line) {
        Ok(result) => result,
        Err(e) => failure(url, format!("undecodable worker output: {}", e)),
    }
}

fn failure(url: &str, reason: String) -> FetchResult {
    tracing::warn!(url = %url, reason = %reason, "process worker failed");
    FetchResult::Failure {
        url: url.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn opts(dir: &std::path::Path) -> FetchOptions {
        FetchOptions {
            dest_dir: dir.to_path_buf(),
            connect_timeout: None,
        }
    }

    fn echo_worker(json: &str) -> WorkerCommand {
        // Fake worker: ignores the appended URL and prints a fixed result.
        WorkerCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), format!("echo '{}'", json), "sh".into()],
        }
    }

    #[test]
    fn decodes_success_from_worker_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::to_string(&FetchResult::Success {
            filename: "cat.jpg".into(),
            bytes: 7,
            elapsed: Duration::from_millis(12),
        })
        .unwrap();
        let results = run(
            &["http://x/cat.jpg".to_string()],
            1,
            &echo_worker(&json),
            &opts(dir.path()),
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
    }

    #[test]
    fn undecodable_output_becomes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let results = run(
            &["http://x/a".to_string()],
            1,
            &echo_worker("not json"),
            &opts(dir.path()),
        );
        match &results[0] {
            FetchResult::Failure { url, reason } => {
                assert_eq!(url, "http://x/a");
                assert!(reason.contains("undecodable"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn missing_program_becomes_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = WorkerCommand {
            program: PathBuf::from("/nonexistent/parfetch-worker"),
            args: vec![],
        };
        let results = run(&["http://x/a".to_string()], 1, &cmd, &opts(dir.path()));
        match &results[0] {
            FetchResult::Failure { reason, .. } => {
                assert!(reason.contains("spawn failed"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn nonzero_exit_becomes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = WorkerCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), "exit 3".into(), "sh".into()],
        };
        let results = run(&["http://x/a".to_string()], 1, &cmd, &opts(dir.path()));
        match &results[0] {
            FetchResult::Failure { reason, .. } => {
                assert!(reason.contains("exited"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn one_result_per_url_with_small_pool() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::to_string(&FetchResult::Failure {
            url: "http://x/n".into(),
            reason: "HTTP 500".into(),
        })
        .unwrap();
        let urls: Vec<String> = (0..5).map(|i| format!("http://x/{}", i)).collect();
        let results = run(&urls, 2, &echo_worker(&json), &opts(dir.path()));
        assert_eq!(results.len(), 5);
    }
}
