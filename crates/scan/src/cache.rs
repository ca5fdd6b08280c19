//! Scan results keyed by package path.

use crate::error::{ErrorKind, Result};
use crate::{ScanOptions, ScanResult, scan_package};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long a finished scan is served from memory by default.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// A scan's outcome, stamped with when it completed.
type Outcome = std::result::Result<(Arc<ScanResult>, Instant), ErrorKind>;
type SharedScan = Shared<BoxFuture<'static, Outcome>>;

#[derive(Default)]
struct State {
    finished: HashMap<PathBuf, (Arc<ScanResult>, Instant)>,
    in_flight: HashMap<PathBuf, SharedScan>,
}

impl State {
    /// Move a completed scan out of `in_flight`, if `scan` is still the one
    /// registered for `path`. Successes are kept; failures are forgotten.
    fn settle(&mut self, path: &Path, scan: &SharedScan, outcome: &Outcome) {
        if !self.in_flight.get(path).is_some_and(|current| current.ptr_eq(scan)) {
            return;
        }
        self.in_flight.remove(path);
        match outcome {
            Ok(finished) => {
                self.finished.insert(path.to_path_buf(), finished.clone());
            },
            Err(_) => {
                self.finished.remove(path);
            },
        }
    }
}

/// Runs scans off the async executor and remembers their results.
///
/// Concurrent requests for the same path share one scan. A finished result
/// is served for `ttl` after it completed; failures are not cached.
pub struct ScanCache {
    options: ScanOptions,
    ttl: Duration,
    state: Mutex<State>,
    started: AtomicU64,
}

impl ScanCache {
    pub fn new(options: ScanOptions, ttl: Duration) -> Self {
        Self { options, ttl, state: Mutex::default(), started: AtomicU64::new(0) }
    }

    /// Scan `path`, or join the scan of it that is already running.
    pub async fn scan(&self, path: impl AsRef<Path>) -> Result<Arc<ScanResult>> {
        let path = path.as_ref().to_path_buf();
        let scan = {
            let mut state = self.state.lock().await;
            // A scan may have completed with nobody left waiting on it.
            if let Some(scan) = state.in_flight.get(&path).cloned()
                && let Some(outcome) = scan.peek().cloned()
            {
                state.settle(&path, &scan, &outcome);
            }
            if let Some((result, finished)) = state.finished.get(&path)
                && finished.elapsed() < self.ttl
            {
                tracing::debug!(package = %path.display(), "Serving cached scan result");
                return Ok(result.clone());
            }
            match state.in_flight.get(&path) {
                Some(scan) => {
                    tracing::debug!(package = %path.display(), "Joining scan already in progress");
                    scan.clone()
                },
                None => {
                    let scan = self.start(path.clone());
                    state.in_flight.insert(path.clone(), scan.clone());
                    scan
                },
            }
        };

        let outcome = scan.clone().await;
        self.state.lock().await.settle(&path, &scan, &outcome);
        outcome.map(|(result, _)| result).map_err(exn::Exn::from)
    }

    /// Drop every finished result.
    pub async fn clear(&self) {
        self.state.lock().await.finished.clear();
    }

    /// Number of scans actually run, as opposed to served or joined.
    pub fn scans_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    fn start(&self, path: PathBuf) -> SharedScan {
        self.started.fetch_add(1, Ordering::Relaxed);
        let options = self.options.clone();
        async move {
            let scanned = tokio::task::spawn_blocking(move || scan_package(&path, &options)).await;
            match scanned {
                Ok(Ok(result)) => Ok((Arc::new(result), Instant::now())),
                Ok(Err(err)) => {
                    tracing::warn!(error = ?err, "Scan failed");
                    Err((*err).clone())
                },
                Err(e) => {
                    tracing::error!(error = %e, "Scan task did not complete");
                    Err(ErrorKind::Task)
                },
            }
        }
        .boxed()
        .shared()
    }
}

impl Default for ScanCache {
    fn default() -> Self {
        Self::new(ScanOptions::default(), DEFAULT_CACHE_TTL)
    }
}
