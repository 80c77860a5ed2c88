//! Output file lifecycle.
//!
//! Each fetch streams into a `.part` temp file next to the final name, then
//! atomically renames on success. A failed fetch discards its temp file, so a
//! non-2xx response or aborted transfer never leaves a final file behind, and
//! two fetches racing on the same derived filename end with one intact winner.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Path for the temp file: appends a per-process unique tag plus `.part`
/// (e.g. `cat.jpg` → `cat.jpg.41712.0.part`). Uniqueness matters when two
/// URLs in one batch derive the same filename: each transfer streams into its
/// own temp file and the atomic renames race cleanly, one complete winner.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut o = final_path.as_os_str().to_owned();
    o.push(format!(".{}.{}{}", std::process::id(), seq, TEMP_SUFFIX));
    PathBuf::from(o)
}

/// Writer for one in-progress download. Cheap to clone (shared fd); each
/// `write_at` is positional (pwrite-style), so the curl write callback can
/// hold a clone while the caller keeps the original for finalize/discard.
#[derive(Clone)]
pub struct PartFile {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl PartFile {
    /// Creates (or truncates) the temp file at `temp_path`.
    pub fn create(temp_path: &Path) -> std::io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(Self {
            file: Arc::new(file),
            temp_path: temp_path.to_path_buf(),
        })
    }

    /// Writes `data` at `offset` without moving a shared cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        let n = self.file.write_at(data, offset)?;
        if n != data.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: {} of {}", n, data.len()),
            ));
        }
        Ok(())
    }

    /// Non-Unix fallback: seek + write on a cloned handle. Not safe for
    /// concurrent writers, which is fine here (one writer per transfer).
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = (*self.file).try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)?;
        Ok(())
    }

    /// Path to the temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically renames the temp file to `final_path`, overwriting any
    /// existing file of that name. Consumes the writer.
    pub fn finalize(self, final_path: &Path) -> std::io::Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        fs::rename(&temp_path, final_path)
    }

    /// Removes the temp file. Best-effort; used on the failure path so a
    /// failed fetch leaves nothing on disk.
    pub fn discard(self) {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        let _ = fs::remove_file(&temp_path);
    }
}
