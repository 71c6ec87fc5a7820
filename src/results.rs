use std::path::PathBuf;
use std::time::Duration;

use crate::error::SearchError;

/// The output of a completed search.
///
/// `paths` holds every match; `warnings` and `faults` describe the parts of
/// the tree that could not be searched. Neither degrades the other entries.
#[derive(Debug)]
pub struct Results {
    /// Absolute paths of every matching file, in no particular order.
    pub paths: Vec<PathBuf>,

    /// Scan performance statistics.
    pub stats: ScanStats,

    /// Directories that could not be listed (permission denied, vanished, IO).
    pub warnings: Vec<SearchError>,

    /// Work units that failed to execute. Their subtrees are missing from `paths`.
    pub faults: Vec<SearchError>,
}

impl Results {
    /// Number of matching files.
    pub fn matches(&self) -> usize {
        self.paths.len()
    }

    /// True when every dispatched work unit ran to completion.
    pub fn is_complete(&self) -> bool {
        self.faults.is_empty()
    }

    /// The matches as plain strings. Non-UTF-8 components are replaced lossily.
    pub fn into_strings(self) -> Vec<String> {
        self.paths
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}

/// Performance statistics for a completed scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanStats {
    /// Total number of non-directory entries encountered (matched or not).
    pub files: usize,

    /// Total number of directories listed, the root included.
    pub dirs: usize,

    /// Wall-clock time from search start to completion.
    pub duration: Duration,

    /// Total entries scanned per second. Equals
    /// `(files + dirs) / duration.as_secs_f64()`, clamped to 0 on
    /// zero-duration runs.
    pub entries_per_sec: usize,
}

impl ScanStats {
    /// Compute `entries_per_sec` from raw counts and duration.
    pub(crate) fn compute(files: usize, dirs: usize, duration: Duration) -> Self {
        let total = files + dirs;
        let eps = if duration.as_secs_f64() > 0.0 {
            (total as f64 / duration.as_secs_f64()) as usize
        } else {
            0
        };
        Self {
            files,
            dirs,
            duration,
            entries_per_sec: eps,
        }
    }
}

/// What one work unit found in its own directory.
///
/// Owned by a single unit while it runs; merged into the caller's accumulator
/// only after the unit has finished.
#[derive(Default)]
pub(crate) struct LocalResult {
    pub paths: Vec<PathBuf>,
    pub files: usize,
    pub dirs: usize,
    pub warnings: Vec<SearchError>,
    pub faults: Vec<SearchError>,
}

impl LocalResult {
    pub fn merge(&mut self, other: LocalResult) {
        self.paths.extend(other.paths);
        self.files += other.files;
        self.dirs += other.dirs;
        self.warnings.extend(other.warnings);
        self.faults.extend(other.faults);
    }

    pub fn finish(self, duration: Duration) -> Results {
        Results {
            paths: self.paths,
            stats: ScanStats::compute(self.files, self.dirs, duration),
            warnings: self.warnings,
            faults: self.faults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates_everything() {
        let mut top = LocalResult {
            paths: vec!["/r/a.txt".into()],
            files: 2,
            dirs: 1,
            ..Default::default()
        };
        top.merge(LocalResult {
            paths: vec!["/r/sub/a.txt".into()],
            files: 3,
            dirs: 1,
            warnings: vec![SearchError::PermissionDenied("/r/locked".into())],
            ..Default::default()
        });

        let results = top.finish(Duration::from_secs(1));
        assert_eq!(results.matches(), 2);
        assert_eq!(results.stats.files, 5);
        assert_eq!(results.stats.dirs, 2);
        assert_eq!(results.stats.entries_per_sec, 7);
        assert_eq!(results.warnings.len(), 1);
        assert!(results.is_complete());
    }

    #[test]
    fn zero_duration_has_no_rate() {
        let stats = ScanStats::compute(10, 2, Duration::ZERO);
        assert_eq!(stats.entries_per_sec, 0);
    }
}
