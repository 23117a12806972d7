//! Artifact file access and the load-once cache that holds fitted artifacts.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ArtifactKind, PipelineError};
use crate::Result;

/// Read an artifact file, retrying transient I/O failures.
///
/// A missing file is reported immediately as `ArtifactNotFound`; retrying
/// cannot make it appear. Any other I/O error is retried up to `retries`
/// extra times with `backoff` between attempts.
pub fn read_with_retry(
    kind: ArtifactKind,
    path: &Path,
    retries: u32,
    backoff: Duration,
) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        match std::fs::read(path) {
            Ok(bytes) => {
                debug!(%kind, path = %path.display(), bytes = bytes.len(), "read artifact");
                return Ok(bytes);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::ArtifactNotFound {
                    kind,
                    path: path.to_path_buf(),
                });
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(
                    %kind,
                    path = %path.display(),
                    attempt,
                    error = %e,
                    "transient artifact read failure, retrying"
                );
                thread::sleep(backoff);
            }
            Err(e) => {
                return Err(PipelineError::ArtifactIo {
                    kind,
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
    }
}

/// Holds one fitted artifact for the lifetime of its owner.
///
/// Readers of a loaded value never lock. The first callers race for the load
/// mutex; the winner loads, the rest find the value on re-check. A failed load
/// leaves the cell empty so a later call can try again.
#[derive(Debug)]
pub struct ArtifactCell<T> {
    value: OnceLock<T>,
    load_lock: Mutex<()>,
    loads: AtomicUsize,
}

impl<T> Default for ArtifactCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ArtifactCell<T> {
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            load_lock: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.value.get().is_some()
    }

    /// Number of successful loads; stays at 1 once the cell is populated.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    pub fn get_or_load<F>(&self, load: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        // The guarded data is `()`, so a poisoned lock carries no broken state.
        let _guard = self
            .load_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let loaded = load()?;
        self.loads.fetch_add(1, Ordering::AcqRel);
        Ok(self.value.get_or_init(|| loaded))
    }
}
