//! Precompiled kernel binary images.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{HostError, Result};
use crate::paths::file_exists;

/// A kernel binary read verbatim from disk. The content is opaque.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryImage {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl BinaryImage {
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for BinaryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryImage")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Read a whole binary file into memory.
///
/// The length is taken from the file itself (seek to end, rewind) and the
/// read must deliver exactly that many bytes; a short read discards the
/// partial buffer. Empty files are rejected.
pub fn load_binary_file(path: impl AsRef<Path>) -> Result<BinaryImage> {
    let path = path.as_ref();
    if !file_exists(path) {
        error!(path = %path.display(), "binary file does not exist");
        return Err(HostError::BinaryNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|source| HostError::BinaryUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = read_whole(file, path)?;

    debug!(path = %path.display(), bytes = bytes.len(), "loaded binary image");
    Ok(BinaryImage {
        path: path.to_path_buf(),
        bytes,
    })
}

/// Size the source by seeking to its end, rewind, then read exactly that
/// many bytes. `path` only labels errors.
fn read_whole<R: Read + Seek>(mut source: R, path: &Path) -> Result<Vec<u8>> {
    let unreadable = |err| HostError::BinaryUnreadable {
        path: path.to_path_buf(),
        source: err,
    };
    let expected = source.seek(SeekFrom::End(0)).map_err(unreadable)?;
    source.rewind().map_err(unreadable)?;

    if expected == 0 {
        error!(path = %path.display(), "binary file is empty");
        return Err(HostError::EmptyBinary {
            path: path.to_path_buf(),
        });
    }

    let capacity =
        usize::try_from(expected).map_err(|_| HostError::Allocation { size: usize::MAX })?;
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(capacity)
        .map_err(|_| HostError::Allocation { size: capacity })?;
    let actual = source
        .take(expected)
        .read_to_end(&mut bytes)
        .map_err(unreadable)? as u64;

    if actual != expected {
        error!(path = %path.display(), expected, actual, "short read on binary file");
        return Err(HostError::ShortRead {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(bytes)
}
