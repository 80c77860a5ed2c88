//! Single-URL fetch: HTTP GET via a blocking curl Easy handle, streaming the
//! body into a `.part` file that is renamed on success.
//!
//! All failures (network, non-2xx status, disk, bad filename) are converted
//! to a `Failure` result here, at the single-fetch boundary.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::batch::FetchResult;
use crate::error::FetchError;
use crate::naming;
use crate::storage::{self, PartFile};

/// Per-fetch options shared by every strategy.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory the output file lands in.
    pub dest_dir: PathBuf,
    /// Optional connect timeout. `None` means curl's default behavior: a hung
    /// connect stalls that one fetch.
    pub connect_timeout: Option<Duration>,
}

/// Filename, final path, and open temp file for one fetch. Derivation and
/// file creation happen before any network I/O so a bad URL fails fast.
pub(crate) struct Prepared {
    pub(crate) filename: String,
    pub(crate) final_path: PathBuf,
    pub(crate) part: PartFile,
}

pub(crate) fn prepare(url: &str, dest_dir: &Path) -> Result<Prepared, FetchError> {
    let filename = naming::derive_filename(url)?;
    let final_path = dest_dir.join(&filename);
    let part = PartFile::create(&storage::temp_path(&final_path))?;
    Ok(Prepared {
        filename,
        final_path,
        part,
    })
}

/// Fetches one URL and writes the body to `<dest_dir>/<filename>`.
/// Always returns a result, never panics or propagates; per-item isolation is
/// the contract the batch driver relies on.
pub fn fetch_one(url: &str, opts: &FetchOptions) -> FetchResult {
    let start = Instant::now();
    match fetch_to_disk(url, opts) {
        Ok((filename, bytes)) => {
            let elapsed = start.elapsed();
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
            tracing::warn!(url = %url, error = %e, "fetch failed");
            FetchResult::Failure {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

fn fetch_to_disk(url: &str, opts: &FetchOptions) -> Result<(String, u64), FetchError> {
    let prepared = prepare(url, &opts.dest_dir)?;
    match stream_body(url, &prepared.part, opts) {
        Ok(bytes) => {
            let temp = prepared.part.temp_path().to_path_buf();
            if let Err(e) = prepared.part.finalize(&prepared.final_path) {
                let _ = std::fs::remove_file(&temp);
                return Err(FetchError::Storage(e));
            }
            Ok((prepared.filename, bytes))
        }
        Err(e) => {
            prepared.part.discard();
            Err(e)
        }
    }
}

/// Performs the GET, appending each chunk to `part` at the running offset.
/// Returns the byte count on a 2xx response.
fn stream_body(url: &str, part: &PartFile, opts: &FetchOptions) -> Result<u64, FetchError> {
    let offset = Arc::new(AtomicU64::new(0));
    let write_err: Arc<Mutex<Option<io::Error>>> = Arc::new(Mutex::new(None));

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    if let Some(t) = opts.connect_timeout {
        easy.connect_timeout(t)?;
    }

    {
        let mut transfer = easy.transfer();
        let part = part.clone();
        let offset_cb = Arc::clone(&offset);
        let write_err_cb = Arc::clone(&write_err);
        transfer.write_function(move |data| {
            let off = offset_cb.fetch_add(data.len() as u64, Ordering::Relaxed);
            match part.write_at(off, data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    *write_err_cb.lock().unwrap() = Some(e);
                    Ok(0) // abort transfer
                }
            }
        })?;
        let performed = transfer.perform();
        if let Some(e) = write_err.lock().unwrap().take() {
            return Err(FetchError::Storage(e));
        }
        performed?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    Ok(offset.load(Ordering::Relaxed))
}
