use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::pool::{PoolHandle, ShutdownStatus, TaskError, TaskHandle, WorkerPool};
use crate::results::{LocalResult, Results};

// ---------------------------------------------------------------------------
// FileSearcher
// ---------------------------------------------------------------------------

/// Searches directory trees for files with an exact name.
///
/// Owns a [`WorkerPool`] that is reused across searches until
/// [`shutdown`](FileSearcher::shutdown) is called.
pub struct FileSearcher {
    pool: WorkerPool,
}

impl FileSearcher {
    /// Create a searcher backed by `threads` workers.
    ///
    /// Use [`fsearch::searcher()`](crate::searcher) for the other options.
    pub fn new(threads: usize) -> Result<Self, SearchError> {
        crate::searcher().threads(threads).build()
    }

    pub(crate) fn with_pool(pool: WorkerPool) -> Self {
        Self { pool }
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.size()
    }

    /// True once [`shutdown`](FileSearcher::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.pool.is_shut_down()
    }

    /// Find every non-directory entry named exactly `file_name` under `root`.
    ///
    /// The root level is listed on the calling thread; every subdirectory is
    /// searched by its own work unit on the pool. Blocks until all transitively
    /// dispatched units have finished.
    ///
    /// # Errors
    ///
    /// - [`SearchError::InvalidArgument`] if `file_name` is empty.
    /// - [`SearchError::InvalidDirectory`] if `root` is missing or not a directory.
    /// - [`SearchError::PoolShutdown`] if the searcher was shut down.
    ///
    /// Unreadable subdirectories and failed work units do not fail the call;
    /// they are reported in [`Results::warnings`] and [`Results::faults`].
    pub fn search(
        &self,
        file_name: &str,
        root: impl AsRef<Path>,
    ) -> Result<Results, SearchError> {
        if file_name.is_empty() {
            return Err(SearchError::InvalidArgument("file name cannot be empty".into()));
        }

        let root = root.as_ref();
        if !root.is_dir() {
            return Err(SearchError::InvalidDirectory(root.to_path_buf()));
        }
        let root = std::path::absolute(root).map_err(|source| SearchError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        if self.pool.is_shut_down() {
            return Err(SearchError::PoolShutdown);
        }

        info!(file_name, root = %root.display(), threads = self.threads(), "Starting search");
        let start = Instant::now();

        // Every unit holds a sender, so the channel only disconnects once the
        // whole tree has been searched.
        let (dispatched_tx, dispatched_rx) = unbounded();
        let root_unit = WorkUnit {
            dir: root,
            target: Arc::new(OsString::from(file_name)),
            pool: self.pool.handle(),
            dispatched: dispatched_tx,
        };
        let merged = join_dispatched(root_unit.run(), &dispatched_rx);

        let results = merged.finish(start.elapsed());
        info!(
            matches = results.matches(),
            files = results.stats.files,
            dirs = results.stats.dirs,
            warnings = results.warnings.len(),
            faults = results.faults.len(),
            duration_ms = results.stats.duration.as_millis() as u64,
            "Search completed"
        );
        Ok(results)
    }

    /// Release the worker pool. See [`WorkerPool::shutdown`].
    pub fn shutdown(&self, timeout: Duration) -> ShutdownStatus {
        self.pool.shutdown(timeout)
    }
}

// ---------------------------------------------------------------------------
// Work units
// ---------------------------------------------------------------------------

/// A subdirectory handed to the pool, paired with its pending result.
struct Dispatched {
    dir: PathBuf,
    handle: TaskHandle<LocalResult>,
}

/// Merge every dispatched unit into `merged`, including units dispatched
/// while waiting. Returns once all senders are gone.
fn join_dispatched(mut merged: LocalResult, dispatched: &Receiver<Dispatched>) -> LocalResult {
    for Dispatched { dir, handle } in dispatched.iter() {
        match handle.join() {
            Ok(local) => merged.merge(local),
            Err(source) => {
                let fault = SearchError::WorkFault { path: dir, source };
                warn!(error = %fault, "Work unit failed");
                merged.faults.push(fault);
            }
        }
    }
    merged
}

/// Searches one directory's immediate children.
struct WorkUnit {
    dir: PathBuf,
    target: Arc<OsString>,
    pool: PoolHandle,
    dispatched: Sender<Dispatched>,
}

impl WorkUnit {
    fn run(self) -> LocalResult {
        let mut local = LocalResult {
            dirs: 1,
            ..Default::default()
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                let warning = SearchError::from_listing(self.dir.clone(), e);
                warn!(error = %warning, "Skipping directory");
                local.warnings.push(warning);
                return local;
            }
        };

        for entry in entries {
            if self.pool.is_cancelled() {
                debug!(dir = %self.dir.display(), "Pool cancelled, stopping early");
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let warning = SearchError::from_listing(self.dir.clone(), e);
                    warn!(error = %warning, "Skipping unreadable entry");
                    local.warnings.push(warning);
                    continue;
                }
            };

            // Symlinks are not followed: a link is matched by its own name.
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    let warning = SearchError::from_listing(entry.path(), e);
                    warn!(error = %warning, "Skipping entry without a file type");
                    local.warnings.push(warning);
                    continue;
                }
            };

            if file_type.is_dir() {
                self.dispatch(entry.path(), &mut local);
            } else {
                local.files += 1;
                if entry.file_name() == *self.target {
                    local.paths.push(entry.path());
                }
            }
        }

        local
    }

    fn dispatch(&self, dir: PathBuf, local: &mut LocalResult) {
        let child = WorkUnit {
            dir: dir.clone(),
            target: Arc::clone(&self.target),
            pool: self.pool.clone(),
            dispatched: self.dispatched.clone(),
        };

        match self.pool.submit(move || child.run()) {
            Ok(handle) => {
                debug!(dir = %dir.display(), "Dispatched work unit");
                // The receiver outlives every unit, since each unit holds a sender.
                let _ = self.dispatched.send(Dispatched { dir, handle });
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Could not dispatch work unit");
                local.faults.push(SearchError::WorkFault {
                    path: dir,
                    source: TaskError::Cancelled,
                });
            }
        }
    }
}
