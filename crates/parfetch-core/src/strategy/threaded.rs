//! Thread-pool strategy: a fixed pool of worker threads shares a queue of
//! URLs; each worker blocks on its own transfer. Results arrive over an mpsc
//! channel in completion order.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::batch::FetchResult;
use crate::fetch::{self, FetchOptions};

/// Runs the batch on `workers` threads. Returns one result per URL, in the
/// order they completed.
pub(crate) fn run(urls: &[String], workers: usize, opts: &FetchOptions) -> Vec<FetchResult> {
    let count = urls.len();
    let work: Arc<Mutex<VecDeque<String>>> =
        Arc::new(Mutex::new(urls.iter().cloned().collect()));
    let (tx, rx) = mpsc::channel();

    let num_workers = workers.min(count).max(1);
    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let work = Arc::clone(&work);
        let tx = tx.clone();
        let opts = opts.clone();
        handles.push(std::thread::spawn(move || loop {
            let url = match work.lock().unwrap().pop_front() {
                Some(u) => u,
                None => break,
            };
            let _ = tx.send(fetch::fetch_one(&url, &opts));
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
