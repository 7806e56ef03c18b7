//! Transient file store: one short-lived on-disk copy per conversion.
//!
//! The engine reads documents from a path, so each decoded payload is written
//! to its own file under the store directory for exactly the duration of one
//! conversion call.
//!
//! Names come from [`tempfile::Builder`], which creates the file with
//! exclusive-create semantics and retries on a name collision, so concurrent
//! requests sharing the directory can never open each other's files. The
//! directory itself is (re)created with `create_dir_all`, which succeeds when
//! a parallel acquire created it first.
//!
//! A [`TransientFile`] deletes its file exactly once: in
//! [`TransientFile::release`] on the normal path, or in `Drop` when the owner
//! unwinds or its future is cancelled. Deletion errors are logged and
//! swallowed; they never change the outcome of the request.

use crate::error::Pdf2TextError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

const FILE_PREFIX: &str = "pdf2text-";
const FILE_SUFFIX: &str = ".pdf";
const RANDOM_CHARS: usize = 16;

/// Hands out [`TransientFile`]s under one directory.
#[derive(Debug, Clone)]
pub struct TransientStore {
    dir: PathBuf,
}

impl TransientStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to a fresh, uniquely named file and return its guard.
    ///
    /// Runs on the blocking pool; the bytes are fully written and synced
    /// before this returns.
    pub async fn acquire(&self, bytes: Vec<u8>) -> Result<TransientFile, Pdf2TextError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || acquire_blocking(&dir, &bytes))
            .await
            .map_err(|e| Pdf2TextError::Internal(format!("Transient write task panicked: {}", e)))?
    }
}

fn acquire_blocking(dir: &Path, bytes: &[u8]) -> Result<TransientFile, Pdf2TextError> {
    let io_err = |source| Pdf2TextError::TransientWriteFailed {
        dir: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;

    // On any error below, dropping `file` removes what was created.
    let mut file = tempfile::Builder::new()
        .prefix(FILE_PREFIX)
        .suffix(FILE_SUFFIX)
        .rand_bytes(RANDOM_CHARS)
        .tempfile_in(dir)
        .map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;

    let path = file.into_temp_path();
    debug!("Acquired transient file {} ({} bytes)", path.display(), bytes.len());
    Ok(TransientFile { path: Some(path) })
}

/// A document copy on disk, deleted when released or dropped.
#[derive(Debug)]
pub struct TransientFile {
    path: Option<TempPath>,
}

impl TransientFile {
    pub fn path(&self) -> &Path {
        match &self.path {
            Some(p) => &**p,
            None => Path::new(""),
        }
    }

    /// Delete the file now. Never fails.
    pub fn release(mut self) {
        if let Some(path) = self.path.take() {
            remove(path);
        }
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            remove(path);
        }
    }
}

fn remove(path: TempPath) {
    let shown = path.to_path_buf();
    match path.close() {
        Ok(()) => debug!("Released transient file {}", shown.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Transient file {} was already gone", shown.display())
        }
        Err(e) => warn!("Could not remove transient file {}: {}", shown.display(), e),
    }
}
