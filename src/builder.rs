use std::time::Duration;

use crate::engine::FileSearcher;
use crate::error::SearchError;
use crate::pool::{WorkerPool, DEFAULT_CANCEL_GRACE, DEFAULT_THREAD_NAME};

// ---------------------------------------------------------------------------
// SearcherBuilder
// ---------------------------------------------------------------------------

/// Configures and constructs a [`FileSearcher`].
///
/// Created via [`fsearch::searcher()`](crate::searcher).
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// let searcher = fsearch::searcher()
///     .threads(8)
///     .cancel_grace(Duration::from_secs(5))
///     .build()?;
///
/// let results = searcher.search("Cargo.toml", ".")?;
/// searcher.shutdown(Duration::from_secs(10));
/// # Ok::<(), fsearch::SearchError>(())
/// ```
pub struct SearcherBuilder {
    threads:      usize,
    cancel_grace: Duration,
    thread_name:  String,
}

impl Default for SearcherBuilder {
    fn default() -> Self {
        Self {
            threads:      available_threads(),
            cancel_grace: DEFAULT_CANCEL_GRACE,
            thread_name:  DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl SearcherBuilder {
    /// Number of worker threads.
    ///
    /// Defaults to the number of logical CPU cores. Must be at least 1.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    /// How long shutdown waits for workers after forcing cancellation.
    ///
    /// Defaults to 60 seconds.
    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Prefix for worker thread names. Workers are named `<prefix>-<n>`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Start the worker pool and return the searcher.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidThreadCount`] for zero threads,
    /// [`SearchError::ThreadPool`] if a worker thread cannot be spawned.
    pub fn build(self) -> Result<FileSearcher, SearchError> {
        let pool = WorkerPool::with_options(self.threads, &self.thread_name, self.cancel_grace)?;
        Ok(FileSearcher::with_pool(pool))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Get the logical CPU count, with a safe fallback.
pub fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
