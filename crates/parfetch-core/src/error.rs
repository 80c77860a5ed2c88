//! Error taxonomy for a single fetch.
//!
//! Errors are converted into `Failure` results at the single-fetch boundary;
//! they never cross into the batch driver as `Err`.

use thiserror::Error;

/// Error from one URL's fetch-and-save. The variant distinguishes network
/// failures, HTTP status failures, disk failures, and URLs that yield no
/// usable filename.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (DNS, connect, timeout, aborted transfer, etc.).
    #[error("{0}")]
    Network(#[from] curl::Error),
    /// The curl multi event loop rejected or lost a transfer.
    #[error("curl multi: {0}")]
    Multi(#[from] curl::MultiError),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Creating, writing, or renaming the output file failed.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// The URL's path has no usable trailing segment to name the file after.
    #[error("no usable filename in URL path: {0}")]
    InvalidFilename(String),
}
