use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fsearch::{FileSearcher, SearchError, ShutdownStatus};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a temporary directory tree for testing.
///
/// Structure:
/// ```text
/// tmp/
///   a.txt
///   notes.md
///   sub/
///     a.txt
///     b.txt
///   sub2/
///     a.txt
///     nested/
///       a.txt.bak
///       xa.txt
/// ```
fn setup_test_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(root.join("a.txt"), "root").unwrap();
    fs::write(root.join("notes.md"), "some notes").unwrap();

    let sub = root.join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("a.txt"), "sub").unwrap();
    fs::write(sub.join("b.txt"), "other").unwrap();

    let nested = root.join("sub2").join("nested");
    fs::create_dir_all(&nested).unwrap();
    fs::write(root.join("sub2").join("a.txt"), "sub2").unwrap();
    fs::write(nested.join("a.txt.bak"), "backup").unwrap();
    fs::write(nested.join("xa.txt"), "near miss").unwrap();

    dir
}

/// Wide and deep tree with a `target.log` scattered across levels.
fn setup_large_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for a in 0..6 {
        for b in 0..5 {
            let leaf = dir.path().join(format!("a{}", a)).join(format!("b{}", b)).join("c");
            fs::create_dir_all(&leaf).unwrap();
            if (a + b) % 2 == 0 {
                fs::write(leaf.join("target.log"), "").unwrap();
            }
            if b == 3 {
                fs::write(leaf.parent().unwrap().join("target.log"), "").unwrap();
            }
            fs::write(leaf.join("noise.log"), "").unwrap();
        }
    }
    dir
}

/// Independent expectation: every non-directory entry named `name`.
fn walkdir_matches(root: &Path, name: &str) -> HashSet<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir() && e.file_name() == name)
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn search_set(threads: usize, name: &str, root: &Path) -> HashSet<PathBuf> {
    let searcher = FileSearcher::new(threads).unwrap();
    let results = searcher.search(name, root).unwrap();
    assert_eq!(searcher.shutdown(Duration::from_secs(5)), ShutdownStatus::Graceful);

    let set: HashSet<PathBuf> = results.paths.iter().cloned().collect();
    assert_eq!(set.len(), results.paths.len(), "results must not contain duplicates");
    set
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn finds_matches_at_every_level() {
    let dir = setup_test_dir();
    let root = dir.path();

    let found = search_set(4, "a.txt", root);

    let expected: HashSet<PathBuf> = [
        root.join("a.txt"),
        root.join("sub").join("a.txt"),
        root.join("sub2").join("a.txt"),
    ]
    .into_iter()
    .collect();
    assert_eq!(found, expected);
}

#[test]
fn missing_name_returns_empty_list() {
    let dir = setup_test_dir();
    let searcher = FileSearcher::new(2).unwrap();

    let results = searcher.search("missing.txt", dir.path()).unwrap();

    assert!(results.paths.is_empty());
    assert!(results.warnings.is_empty());
    assert!(results.is_complete());
    searcher.shutdown(Duration::from_secs(5));
}

#[test]
fn matching_is_exact() {
    let dir = setup_test_dir();

    assert!(search_set(2, "A.TXT", dir.path()).is_empty());
    assert!(search_set(2, "txt", dir.path()).is_empty());
    assert!(search_set(2, "*.txt", dir.path()).is_empty());
    assert_eq!(search_set(2, "xa.txt", dir.path()).len(), 1);
}

#[test]
fn directories_are_never_matches() {
    let dir = setup_test_dir();
    assert!(search_set(2, "sub", dir.path()).is_empty());
}

#[test]
fn pool_size_does_not_change_the_result_set() {
    let dir = setup_large_dir();
    let expected = walkdir_matches(dir.path(), "target.log");
    assert!(!expected.is_empty());

    assert_eq!(search_set(1, "target.log", dir.path()), expected);
    assert_eq!(search_set(8, "target.log", dir.path()), expected);
}

#[test]
fn searcher_is_reusable() {
    let dir = setup_large_dir();
    let searcher = FileSearcher::new(3).unwrap();

    let first = searcher.search("target.log", dir.path()).unwrap();
    let second = searcher.search("noise.log", dir.path()).unwrap();
    let third = searcher.search("target.log", dir.path()).unwrap();

    assert_eq!(first.matches(), third.matches());
    assert_eq!(second.matches(), 30);
    assert_eq!(first.stats.dirs, second.stats.dirs);
    searcher.shutdown(Duration::from_secs(5));
}

#[test]
fn results_are_absolute_strings() {
    let dir = setup_test_dir();
    let searcher = FileSearcher::new(2).unwrap();

    let paths = searcher.search("b.txt", dir.path()).unwrap().into_strings();

    assert_eq!(paths, vec![dir.path().join("sub").join("b.txt").to_string_lossy().into_owned()]);
    assert!(Path::new(&paths[0]).is_absolute());
    searcher.shutdown(Duration::from_secs(5));
}

#[test]
fn empty_name_is_invalid_argument() {
    let dir = setup_test_dir();
    let searcher = FileSearcher::new(2).unwrap();

    let err = searcher.search("", dir.path()).err().unwrap();
    assert!(matches!(err, SearchError::InvalidArgument(_)));
    searcher.shutdown(Duration::from_secs(5));
}

#[test]
fn missing_root_is_invalid_directory() {
    let dir = setup_test_dir();
    let searcher = FileSearcher::new(2).unwrap();

    let missing = dir.path().join("does-not-exist");
    let err = searcher.search("a.txt", &missing).err().unwrap();
    assert!(matches!(err, SearchError::InvalidDirectory(ref p) if *p == missing));

    let file_root = dir.path().join("notes.md");
    let err = searcher.search("a.txt", &file_root).err().unwrap();
    assert!(matches!(err, SearchError::InvalidDirectory(_)));
    searcher.shutdown(Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn unreadable_subtree_does_not_fail_the_search() {
    use std::os::unix::fs::PermissionsExt;

    let dir = setup_test_dir();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("a.txt"), "hidden").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users bypass directory permissions.
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let searcher = FileSearcher::new(4).unwrap();
    let results = searcher.search("a.txt", dir.path()).unwrap();
    searcher.shutdown(Duration::from_secs(5));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(results.matches(), 3, "siblings of the locked directory are still searched");
    assert_eq!(results.warnings.len(), 1);
    assert!(matches!(&results.warnings[0], SearchError::PermissionDenied(p) if *p == locked));
    assert!(results.warnings[0].is_recoverable());
    assert!(results.is_complete());
}

#[cfg(unix)]
#[test]
fn symlinks_are_not_followed() {
    let dir = setup_test_dir();
    let root = dir.path();
    std::os::unix::fs::symlink(root, root.join("sub").join("back-to-root")).unwrap();
    std::os::unix::fs::symlink(root.join("notes.md"), root.join("sub2").join("link.md")).unwrap();

    assert_eq!(search_set(2, "a.txt", root).len(), 3);
    assert_eq!(
        search_set(2, "link.md", root),
        walkdir_matches(root, "link.md"),
        "a link is matched by its own name"
    );
}

#[test]
fn search_after_shutdown_is_rejected() {
    let dir = setup_test_dir();
    let searcher = FileSearcher::new(2).unwrap();
    assert_eq!(searcher.shutdown(Duration::from_secs(5)), ShutdownStatus::Graceful);
    assert!(searcher.is_shut_down());

    assert!(matches!(
        searcher.search("a.txt", dir.path()),
        Err(SearchError::PoolShutdown)
    ));
}
