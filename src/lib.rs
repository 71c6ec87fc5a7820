//! # fsearch
//!
//! Concurrent file-name search over a directory tree.
//!
//! A [`FileSearcher`] owns a fixed-size [`WorkerPool`]. Each search lists the
//! root on the calling thread and hands every subdirectory to the pool as its
//! own work unit; units dispatch their own subdirectories the same way. Each
//! unit keeps its matches private and the caller merges them once every unit,
//! however deep, has finished.
//!
//! The crate does no console I/O. Progress and problems are reported through
//! `tracing` events and through the returned [`Results`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::create_dir(dir.path().join("sub")).unwrap();
//! std::fs::write(dir.path().join("a.txt"), "").unwrap();
//! std::fs::write(dir.path().join("sub").join("a.txt"), "").unwrap();
//!
//! let searcher = fsearch::FileSearcher::new(4).unwrap();
//! let results = searcher.search("a.txt", dir.path()).unwrap();
//!
//! assert_eq!(results.matches(), 2);
//! println!("Found {} matches in {:.3}s",
//!     results.matches(),
//!     results.stats.duration.as_secs_f64()
//! );
//!
//! searcher.shutdown(Duration::from_secs(5));
//! ```
//!
//! # Partial failures
//!
//! A directory that cannot be listed is skipped and reported in
//! [`Results::warnings`]. A work unit that fails to run is reported in
//! [`Results::faults`]. Neither aborts the search; only an empty name or an
//! invalid root does.

#![forbid(unsafe_code)]

pub mod pool;

mod builder;
mod engine;
mod error;
mod results;

use std::time::Duration;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::{available_threads, SearcherBuilder};
pub use engine::FileSearcher;
pub use error::SearchError;
pub use pool::{await_all, ShutdownStatus, TaskError, WorkerPool};
pub use results::{Results, ScanStats};

/// How long front ends wait for a searcher's pool to drain before cancelling.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`SearcherBuilder`] to configure a [`FileSearcher`].
///
/// # Example
///
/// ```rust
/// let searcher = fsearch::searcher().threads(2).build().unwrap();
/// assert_eq!(searcher.threads(), 2);
/// searcher.shutdown(fsearch::DEFAULT_SHUTDOWN_TIMEOUT);
/// ```
pub fn searcher() -> SearcherBuilder {
    SearcherBuilder::default()
}
