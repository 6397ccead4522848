//! Filesystem helpers for locating kernel binaries.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// True if `path` is a regular file that can be opened for reading.
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    path.is_file() && File::open(path).is_ok()
}

/// Change the working directory to the directory holding the running
/// executable, so relative binary paths resolve next to it.
pub fn set_cwd_to_exec_dir() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "executable has no parent directory")
        })?
        .to_path_buf();
    std::env::set_current_dir(&dir)?;
    debug!(dir = %dir.display(), "changed working directory to executable directory");
    Ok(dir)
}
