use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::pool::TaskError;

#[derive(Error, Debug)]
pub enum SearchError {
    // Request validation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not a directory: {}", .0.display())]
    InvalidDirectory(PathBuf),

    // Config
    #[error("invalid thread count: {0}")]
    InvalidThreadCount(usize),

    #[error("thread pool failure: {0}")]
    ThreadPool(String),

    // Traversal
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Runtime
    #[error("work unit for {} failed", path.display())]
    WorkFault {
        path: PathBuf,
        #[source]
        source: TaskError,
    },

    #[error("worker pool is shut down")]
    PoolShutdown,

    #[error("worker pool did not terminate within {0:?}")]
    ShutdownTimeout(Duration),
}

impl SearchError {
    /// The path this error occurred at, if applicable.
    /// Callers use this to present "Skipped: <path>" without pattern matching on variants.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::InvalidDirectory(p)
            | Self::PermissionDenied(p)
            | Self::NotFound(p)
            | Self::Io { path: p, .. }
            | Self::WorkFault { path: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Whether the search can continue after this error.
    ///
    /// Recoverable errors (unreadable directories, failed work units) are
    /// collected into [`Results`](crate::Results) and the walk keeps going.
    ///
    /// Fatal errors (bad arguments, invalid root, pool failures) end the call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::NotFound(_)
                | Self::Io { .. }
                | Self::WorkFault { .. }
        )
    }

    /// Map a directory listing failure to the matching subtree warning.
    pub(crate) fn from_listing(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io { path, source: err },
        }
    }
}
