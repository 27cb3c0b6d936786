use crate::error::LockError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Contents of a held lock file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockMarker {
    pub pipeline: String,
    pub run_id: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

/// Advisory single-instance lock for one pipeline.
///
/// The marker is a file created with create-new semantics, so exactly one
/// process can win acquisition. It is removed when the [`RunLockGuard`] is
/// released or dropped.
#[derive(Debug, Clone)]
pub struct RunLock {
    pipeline: String,
    path: PathBuf,
}

/// Held lock. Releasing it (explicitly or on drop) removes the marker.
#[derive(Debug)]
pub struct RunLockGuard {
    pipeline: String,
    path: PathBuf,
    released: bool,
}

impl RunLock {
    pub fn new(dir: impl AsRef<Path>, pipeline: &str) -> Self {
        RunLock {
            pipeline: pipeline.to_string(),
            path: dir.as_ref().join(format!("{pipeline}.lock")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Returns `None` when another run holds the marker.
    pub fn try_acquire(&self, run_id: &str) -> Result<Option<RunLockGuard>, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }

        let marker = LockMarker {
            pipeline: self.pipeline.clone(),
            run_id: run_id.to_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&marker)?;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(self.io(e)),
        };

        if let Err(e) = file.write_all(&body).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(&self.path);
            return Err(self.io(e));
        }

        info!(pipeline = %self.pipeline, path = %self.path.display(), "Run lock acquired");
        Ok(Some(RunLockGuard {
            pipeline: self.pipeline.clone(),
            path: self.path.clone(),
            released: false,
        }))
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Result<Option<LockMarker>, LockError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io(e)),
        }
    }

    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Operator recovery for a marker left behind by a killed process.
    pub fn force_release(&self) -> Result<bool, LockError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                warn!(pipeline = %self.pipeline, "Run lock forcibly released");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io(e)),
        }
    }
}

impl RunLockGuard {
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(pipeline = %self.pipeline, "Run lock released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Io {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => info!(pipeline = %self.pipeline, "Run lock released on drop"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(pipeline = %self.pipeline, error = %e, "Failed to remove run lock"),
        }
    }
}
