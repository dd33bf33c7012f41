//! Record Snapshot - scoped restore of a record's original bytes
//!
//! A `RecordSnapshot` is armed on capture. It must be consumed with
//! `restore`; if it is dropped while still armed (a panic unwinding through
//! the calculator) the bytes are written back from `Drop`.

use std::fs::{self, OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::hashing::{file_digest, sha256_hex};
use crate::record::RecordError;

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("could not write original bytes back to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("restored {} but its digest is {actual}, expected {expected}", path.display())]
    Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

#[derive(Debug)]
pub struct RecordSnapshot {
    path: PathBuf,
    target: PathBuf,
    bytes: Vec<u8>,
    permissions: Permissions,
    digest: String,
    armed: bool,
}

impl RecordSnapshot {
    /// Capture the record's raw bytes and permissions.
    ///
    /// Symlinks are resolved here; the restore writes through to the file
    /// the link pointed at when the snapshot was taken.
    pub fn capture(path: &Path) -> Result<Self, RecordError> {
        let not_found = |source| RecordError::NotFound {
            path: path.to_path_buf(),
            source,
        };
        let target = fs::canonicalize(path).map_err(not_found)?;
        let bytes = fs::read(&target).map_err(not_found)?;
        let permissions = fs::metadata(&target).map_err(not_found)?.permissions();
        let digest = sha256_hex(&bytes);

        tracing::debug!(
            path = %path.display(),
            target = %target.display(),
            %digest,
            "captured record snapshot"
        );

        Ok(Self {
            path: path.to_path_buf(),
            target,
            bytes,
            permissions,
            digest,
            armed: true,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Write the captured bytes back and verify them.
    pub fn restore(mut self) -> Result<(), RestoreError> {
        self.armed = false;
        self.write_back()?;
        self.verify()
    }

    /// Overwrite the target in place so its inode, links and owner survive.
    fn write_back(&self) -> Result<(), RestoreError> {
        let write_err = |source| RestoreError::Write {
            path: self.target.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.target)
            .map_err(write_err)?;
        file.write_all(&self.bytes).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        let current = file.metadata().map_err(write_err)?.permissions();
        if current != self.permissions {
            fs::set_permissions(&self.target, self.permissions.clone()).map_err(write_err)?;
        }
        Ok(())
    }

    /// Read back through the caller's path, so a link the calculator
    /// replaced shows up as a mismatch.
    fn verify(&self) -> Result<(), RestoreError> {
        let actual = file_digest(&self.path).map_err(|source| RestoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        if actual != self.digest {
            return Err(RestoreError::Mismatch {
                path: self.path.clone(),
                expected: self.digest.clone(),
                actual,
            });
        }
        tracing::debug!(path = %self.path.display(), "record restored");
        Ok(())
    }
}

impl Drop for RecordSnapshot {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        tracing::warn!(
            path = %self.path.display(),
            "snapshot dropped without restore; restoring now"
        );
        if let Err(err) = self.write_back().and_then(|()| self.verify()) {
            tracing::error!(
                path = %self.path.display(),
                error = %err,
                "FAILED TO RESTORE VERSION RECORD; original content may be lost"
            );
        }
    }
}
