//! # Fetch Pool
//!
//! Bounded registry of background fetch workers.
//!
//! Workers are kept oldest to newest. Admitting a worker beyond the limit
//! cancels the oldest ones rather than queueing the new one: during playback
//! the most recent request is the track the listener actually wants, and a
//! skipped track should stop consuming bandwidth.
//!
//! Cancellation first fires the worker's [`CancellationToken`], then waits up
//! to the configured grace period before aborting the task. Whatever the
//! worker left behind (data file and sentinel) is deleted afterwards unless
//! the fetch completed in the meantime.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a background fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// All bytes landed and the entry was registered.
    Completed(u64),
    /// Transfer failed; partial data was removed.
    Failed,
    /// Stopped by its cancellation token.
    Cancelled,
    /// Another worker already owned the sentinel.
    Skipped,
}

/// Result of asking the pool to run a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new worker was spawned after cancelling `cancelled` older ones.
    Started { cancelled: usize },
    /// A worker for the same file was already running; it is now the newest.
    AlreadyRunning,
}

struct InFlight {
    path: PathBuf,
    sentinel: PathBuf,
    token: CancellationToken,
    handle: JoinHandle<FetchOutcome>,
    started: Instant,
}

/// Background fetch workers, bounded by a concurrency limit.
pub struct FetchPool {
    workers: Mutex<VecDeque<InFlight>>,
    limit: usize,
    cancel_grace: Duration,
    cancelled: AtomicU64,
}

impl FetchPool {
    pub fn new(limit: usize, cancel_grace: Duration) -> Self {
        Self {
            workers: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
            cancel_grace,
            cancelled: AtomicU64::new(0),
        }
    }

    /// Running workers, after dropping finished ones.
    pub fn len(&self) -> usize {
        let mut workers = self.workers.lock();
        Self::reap_locked(&mut workers);
        workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total workers cancelled over the pool's lifetime.
    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns `true` if a worker for `path` is still running.
    pub fn contains(&self, path: &Path) -> bool {
        let mut workers = self.workers.lock();
        Self::reap_locked(&mut workers);
        workers.iter().any(|worker| worker.path == path)
    }

    /// Drop finished workers from the registry. Returns how many were removed.
    pub fn reap(&self) -> usize {
        Self::reap_locked(&mut self.workers.lock())
    }

    /// Make the worker for `path` the newest. Returns `false` if none runs.
    pub fn promote(&self, path: &Path) -> bool {
        let mut workers = self.workers.lock();
        Self::promote_locked(&mut workers, path)
    }

    /// Run `work` in a new worker for `path`, cancelling the oldest workers
    /// so that at most `limit` run afterwards.
    ///
    /// `work` receives the worker's cancellation token. If a worker for the
    /// same `path` is already running no new one is started.
    pub async fn launch<F, Fut>(&self, path: PathBuf, sentinel: PathBuf, work: F) -> Admission
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = FetchOutcome> + Send + 'static,
    {
        let victims = {
            let mut workers = self.workers.lock();
            Self::reap_locked(&mut workers);

            if Self::promote_locked(&mut workers, &path) {
                return Admission::AlreadyRunning;
            }

            let excess = (workers.len() + 1).saturating_sub(self.limit);
            let victims: Vec<InFlight> = workers.drain(..excess).collect();

            let token = CancellationToken::new();
            let handle = tokio::spawn(work(token.clone()));
            workers.push_back(InFlight {
                path,
                sentinel,
                token,
                handle,
                started: Instant::now(),
            });
            victims
        };

        let cancelled = victims.len();
        for victim in victims {
            self.cancel(victim).await;
        }
        Admission::Started { cancelled }
    }

    /// Cancel every running worker.
    pub async fn shutdown(&self) {
        let workers: Vec<InFlight> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if !worker.handle.is_finished() {
                self.cancel(worker).await;
            }
        }
    }

    async fn cancel(&self, mut worker: InFlight) {
        debug!(
            file = ?worker.path.file_name(),
            running_for = ?worker.started.elapsed(),
            "Cancelling background fetch"
        );
        worker.token.cancel();

        let outcome = match tokio::time::timeout(self.cancel_grace, &mut worker.handle).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(err)) => {
                warn!(error = %err, "Background fetch panicked");
                None
            }
            Err(_) => {
                warn!(grace = ?self.cancel_grace, "Background fetch ignored cancellation, aborting");
                worker.handle.abort();
                None
            }
        };

        match outcome {
            Some(FetchOutcome::Completed(_)) | Some(FetchOutcome::Skipped) => {}
            _ => {
                discard(&worker.path).await;
                discard(&worker.sentinel).await;
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn reap_locked(workers: &mut VecDeque<InFlight>) -> usize {
        let before = workers.len();
        workers.retain(|worker| !worker.handle.is_finished());
        before - workers.len()
    }

    fn promote_locked(workers: &mut VecDeque<InFlight>, path: &Path) -> bool {
        match workers.iter().position(|worker| worker.path == path) {
            Some(pos) => {
                if let Some(worker) = workers.remove(pos) {
                    workers.push_back(worker);
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        // Leftover sentinels are cleaned up by crash recovery on next open.
        for worker in self.workers.get_mut().drain(..) {
            worker.token.cancel();
            worker.handle.abort();
        }
    }
}

/// Delete `path`, treating a missing file as success.
pub(crate) async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = ?path.file_name(), error = %e, "Failed to remove cache file"),
    }
}
