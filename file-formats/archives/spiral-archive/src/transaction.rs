//! Staged, atomically committed container writes
//!
//! A [`Transaction`] stages new container bytes in a temporary file next to
//! the target and replaces the target with a single rename on commit. The
//! target is never opened for writing, so any failure before the rename
//! leaves it byte-for-byte unchanged. A replaced target keeps its
//! permissions.

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A pending replacement of one file
#[derive(Debug)]
pub struct Transaction {
    target: PathBuf,
    staging: Option<NamedTempFile>,
}

impl Transaction {
    /// Start a transaction against `target`
    ///
    /// The staging file is created in the target's directory so the final
    /// rename never crosses filesystems.
    pub fn begin<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let staging = tempfile::Builder::new()
            .prefix(".spiral-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| Error::transaction(&target, format!("cannot create staging file: {e}")))?;

        log::debug!(
            "Began transaction for {} (staging {})",
            target.display(),
            staging.path().display()
        );
        Ok(Self {
            target,
            staging: Some(staging),
        })
    }

    /// The file this transaction replaces
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path of the staging file, while one exists
    pub fn staging_path(&self) -> Option<&Path> {
        self.staging.as_ref().map(NamedTempFile::path)
    }

    /// Write into the staging file
    ///
    /// If `write` fails the transaction is aborted and the error returned.
    pub fn stage_write<T, F>(&mut self, write: F) -> Result<T>
    where
        F: FnOnce(&mut File) -> Result<T>,
    {
        let staging = self
            .staging
            .as_mut()
            .ok_or_else(|| Error::transaction(&self.target, "transaction is no longer active"))?;

        match write(staging.as_file_mut()) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::debug!("Staging for {} failed, aborting: {e}", self.target.display());
                self.staging = None;
                Err(e)
            }
        }
    }

    /// Flush, sync and atomically move the staging file over the target
    ///
    /// # Errors
    /// - `Error::TransactionFailure` if the transaction was aborted or the
    ///   sync or rename fails; the staging file is removed and the target
    ///   is untouched
    pub fn commit(mut self) -> Result<()> {
        let mut staging = self
            .staging
            .take()
            .ok_or_else(|| Error::transaction(&self.target, "nothing staged to commit"))?;

        let file = staging.as_file_mut();
        file.flush()
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::transaction(&self.target, format!("cannot sync staging file: {e}")))?;

        if let Ok(metadata) = fs::metadata(&self.target) {
            fs::set_permissions(staging.path(), metadata.permissions()).map_err(|e| {
                Error::transaction(&self.target, format!("cannot copy target permissions: {e}"))
            })?;
        }

        staging
            .persist(&self.target)
            .map_err(|e| Error::transaction(&self.target, format!("cannot replace target: {}", e.error)))?;

        log::info!("Committed {}", self.target.display());
        Ok(())
    }

    /// Discard the staged bytes
    pub fn abort(mut self) {
        if self.staging.take().is_some() {
            log::debug!("Aborted transaction for {}", self.target.display());
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.staging.is_some() {
            log::debug!(
                "Discarding uncommitted staging file for {}",
                self.target.display()
            );
        }
    }
}
