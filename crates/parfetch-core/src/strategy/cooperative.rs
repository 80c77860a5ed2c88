//! Cooperative single-threaded strategy: one curl multi handle drives every
//! transfer with non-blocking I/O. All transfers are launched eagerly, then
//! jointly awaited; a failed transfer never disturbs its siblings.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use curl::easy::{Easy2, Handler, WriteError};
use curl::multi::{Easy2Handle, Multi};

use crate::batch::FetchResult;
use crate::error::FetchError;
use crate::fetch::{self, FetchOptions, Prepared};
use crate::storage::PartFile;

/// Handler state for one transfer: appends chunks to the `.part` file at the
/// running offset, remembering the first disk error so the transfer aborts.
struct TransferHandler {
    part: PartFile,
    bytes: u64,
    write_err: Option<io::Error>,
}

impl Handler for TransferHandler {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.write_err.is_some() {
            return Ok(0);
        }
        match self.part.write_at(self.bytes, data) {
            Ok(()) => {
                self.bytes += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                self.write_err = Some(e);
                Ok(0) // abort transfer
            }
        }
    }
}

struct Active {
    handle: Easy2Handle<TransferHandler>,
    url: String,
    filename: String,
    final_path: PathBuf,
    started: Instant,
}

/// Runs the batch on the current thread via curl multi. Returns one result
/// per URL; URLs that fail before the network (bad filename, disk) are
/// reported first, the rest in completion order.
pub(crate) fn run(urls: &[String], opts: &FetchOptions) -> Vec<FetchResult> {
    let mut results = Vec::with_capacity(urls.len());
    let multi = Multi::new();
    let mut active: Vec<Active> = Vec::new();

    for url in urls {
        match add_transfer(&multi, url, opts) {
            Ok(a) => active.push(a),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "fetch failed");
                results.push(FetchResult::Failure {
                    url: url.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    while !active.is_empty() {
        let running = match multi.perform() {
            Ok(n) => n,
            Err(e) => {
                // Event loop itself broke; account for every transfer still
                // in flight so the batch keeps its one-result-per-URL contract.
                drain_as_failures(&multi, active, &mut results, &e);
                break;
            }
        };

        let mut finished: Vec<(usize, Result<(), curl::Error>)> = Vec::new();
        multi.messages(|msg| {
            for (i, a) in active.iter().enumerate() {
                if let Some(res) = msg.result_for2(&a.handle) {
                    finished.push((i, res));
                    break;
                }
            }
        });
        finished.sort_by(|a, b| b.0.cmp(&a.0));
        for (i, transfer_res) in finished {
            let a = active.remove(i);
            let url = a.url.clone();
            match multi.remove2(a.handle) {
                Ok(easy) => results.push(complete(easy, transfer_res, a.url, a.filename, a.final_path, a.started)),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "fetch failed");
                    results.push(FetchResult::Failure {
                        url,
                        reason: format!("curl multi: {}", e),
                    });
                }
            }
        }

        if running > 0 {
            let _ = multi.wait(&mut [], Duration::from_millis(100));
        }
    }

    results
}

fn add_transfer(multi: &Multi, url: &str, opts: &FetchOptions) -> Result<Active, FetchError> {
    let started = Instant::now();
    let Prepared {
        filename,
        final_path,
        part,
    } = fetch::prepare(url, &opts.dest_dir)?;
    let cleanup = part.clone();
    match configure_and_add(multi, url, opts, part) {
        Ok(handle) => Ok(Active {
            handle,
            url: url.to_string(),
            filename,
            final_path,
            started,
        }),
        Err(e) => {
            cleanup.discard();
            Err(e)
        }
    }
}

fn configure_and_add(
    multi: &Multi,
    url: &str,
    opts: &FetchOptions,
    part: PartFile,
) -> Result<Easy2Handle<TransferHandler>, FetchError> {
    let mut easy = Easy2::new(TransferHandler {
        part,
        bytes: 0,
        write_err: None,
    });
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    if let Some(t) = opts.connect_timeout {
        easy.connect_timeout(t)?;
    }
    let handle = multi.add2(easy)?;
    Ok(handle)
}

/// Builds the terminal result for one completed transfer.
fn complete(
    mut easy: Easy2<TransferHandler>,
    transfer_res: Result<(), curl::Error>,
    url: String,
    filename: String,
    final_path: PathBuf,
    started: Instant,
) -> FetchResult {
    let code = easy.response_code().unwrap_or(0);
    let handler = easy.get_mut();
    let bytes = handler.bytes;
    let write_err = handler.write_err.take();
    let part = handler.part.clone();

    let outcome: Result<(), FetchError> = if let Some(e) = write_err {
        Err(FetchError::Storage(e))
    } else if let Err(e) = transfer_res {
        Err(FetchError::Network(e))
    } else if !(200..300).contains(&code) {
        Err(FetchError::Http(code))
    } else {
        Ok(())
    };

    match outcome {
        Ok(()) => {
            let temp = part.temp_path().to_path_buf();
            if let Err(e) = part.finalize(&final_path) {
                let _ = std::fs::remove_file(&temp);
                let err = FetchError::Storage(e);
                tracing::warn!(url = %url, error = %err, "fetch failed");
                return FetchResult::Failure {
                    url,
                    reason: err.to_string(),
                };
            }
            let elapsed = started.elapsed();
            tracing::info!(
                filename = %filename,
                bytes,
                elapsed_secs = elapsed.as_secs_f64(),
                "downloaded"
            );
            FetchResult::Success {
                filename,
                bytes,
                elapsed,
            }
        }
        Err(e) => {
            part.discard();
            tracing::warn!(url = %url, error = %e, "fetch failed");
            FetchResult::Failure {
                url,
                reason: e.to_string(),
            }
        }
    }
}

/// Converts every still-active transfer into a failure after a fatal event
/// loop error, discarding temp files along the way.
fn drain_as_failures(
    multi: &Multi,
    active: Vec<Active>,
    results: &mut Vec<FetchResult>,
    cause: &curl::MultiError,
) {
    for a in active {
        if let Ok(mut easy) = multi.remove2(a.handle) {
            easy.get_mut().part.clone().discard();
        }
        results.push(FetchResult::Failure {
            url: a.url,
            reason: format!("curl multi perform: {}", cause),
        });
    }
}
