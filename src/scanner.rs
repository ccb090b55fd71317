//! One-shot sorting pass over the watched directory.
//!
//! The directory is listed once, up front, so category folders created while
//! sorting are never revisited in the same pass.

use crate::activity_log::ActivityLog;
use crate::file_organizer::{FileOrganizer, MoveOutcome, Trigger};
use crate::rules::RuleTable;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that stop a scan before any file is touched.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The watched directory is missing or cannot be listed.
    #[error("Cannot read watched directory {}: {source}", path.display())]
    InvalidRoot { path: PathBuf, source: io::Error },
}

/// Everything one scan did, one outcome per listed file.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub outcomes: Vec<MoveOutcome>,
}

impl ScanReport {
    /// Files actually relocated. Unmatched, skipped and failed files don't count.
    pub fn moved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_moved()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Moved file count per destination folder name.
    pub fn moved_by_folder(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            if let MoveOutcome::Moved { destination, .. } = outcome
                && let Some(folder) = destination
                    .parent()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().to_string())
            {
                *counts.entry(folder).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// A file a scan would move, as reported by [`plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub path: PathBuf,
    pub folder: String,
}

/// Lists the regular files directly inside `root`.
fn list_files(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(root).map_err(|source| ScanError::InvalidRoot {
        path: root.to_path_buf(),
        source,
    })?;

    // Follows symlinks, like the mover's own regular-file check.
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Sorts every file currently in `root`.
pub fn scan(root: &Path, rules: &RuleTable, log: &ActivityLog) -> Result<ScanReport, ScanError> {
    let files = list_files(root)?;
    log.record("Starting manual sort");
    debug!(root = %root.display(), files = files.len(), "scanning");

    let organizer = FileOrganizer::new(root, rules, log);
    let report = ScanReport {
        outcomes: files
            .iter()
            .map(|file| organizer.relocate(file, Trigger::Scan))
            .collect(),
    };

    let moved = report.moved();
    log.record(&format!("Manual sort complete, {moved} file(s) moved"));
    info!(moved, failed = report.failed(), "scan finished");
    Ok(report)
}

/// Reports what [`scan`] would do without touching the filesystem.
pub fn plan(root: &Path, rules: &RuleTable, log: &ActivityLog) -> Result<Vec<PlannedMove>, ScanError> {
    let organizer = FileOrganizer::new(root, rules, log);
    Ok(list_files(root)?
        .into_iter()
        .filter_map(|path| {
            organizer
                .planned_folder(&path)
                .map(|folder| PlannedMove { path, folder })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_log(dir: &TempDir) -> ActivityLog {
        ActivityLog::open(dir.path().join("activity.log")).expect("Failed to open log")
    }

    #[test]
    fn test_scan_counts_only_moved_files() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();

        fs::write(root.path().join("a.pdf"), "pdf").unwrap();
        fs::write(root.path().join("b.png"), "png").unwrap();
        fs::write(root.path().join("c.unknown"), "?").unwrap();
        fs::write(root.path().join("Makefile"), "all:").unwrap();

        let report = scan(root.path(), &rules, &log).expect("scan should succeed");

        assert_eq!(report.moved(), 2);
        assert_eq!(report.outcomes.len(), 4);
        assert!(root.path().join("Documents/a.pdf").exists());
        assert!(root.path().join("Images/b.png").exists());
        assert!(root.path().join("c.unknown").exists());
        assert!(root.path().join("Makefile").exists());

        let counts = report.moved_by_folder();
        assert_eq!(counts.get("Documents"), Some(&1));
        assert_eq!(counts.get("Images"), Some(&1));
    }

    #[test]
    fn test_scan_skips_subdirectories() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();

        fs::create_dir(root.path().join("folder.zip")).unwrap();
        fs::create_dir(root.path().join("Images")).unwrap();
        fs::write(root.path().join("Images/old.png"), "png").unwrap();

        let report = scan(root.path(), &rules, &log).expect("scan should succeed");
        assert_eq!(report.moved(), 0);
        assert!(report.outcomes.is_empty());
        assert!(root.path().join("folder.zip").is_dir());
    }

    #[test]
    fn test_scan_logs_start_and_summary() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();
        fs::write(root.path().join("song.mp3"), "mp3").unwrap();

        scan(root.path(), &rules, &log).expect("scan should succeed");

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("Starting manual sort"));
        assert!(lines[1].contains("Moved '"));
        assert!(lines[2].ends_with("Manual sort complete, 1 file(s) moved"));
    }

    #[test]
    fn test_scan_missing_root_is_error() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();

        let result = scan(&root.path().join("missing"), &rules, &log);
        assert!(matches!(result, Err(ScanError::InvalidRoot { .. })));
    }

    #[test]
    fn test_plan_does_not_move() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();
        fs::write(root.path().join("a.csv"), "1,2").unwrap();
        fs::write(root.path().join("b.txt"), "text").unwrap();

        let planned = plan(root.path(), &rules, &log).expect("plan should succeed");

        assert_eq!(
            planned,
            vec![PlannedMove {
                path: root.path().join("a.csv"),
                folder: "Spreadsheets".to_string(),
            }]
        );
        assert!(root.path().join("a.csv").exists());
        assert!(!root.path().join("Spreadsheets").exists());
        assert!(fs::read_to_string(log.path()).unwrap().is_empty());
    }

    #[test]
    fn test_plan_skips_rules_pointing_at_root() {
        let root = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();
        rules.apply([(".pdf".to_string(), ".".to_string())]);
        fs::write(root.path().join("keep.pdf"), "pdf").unwrap();

        let planned = plan(root.path(), &rules, &log).expect("plan should succeed");
        assert!(planned.is_empty());

        let report = scan(root.path(), &rules, &log).expect("scan should succeed");
        assert_eq!(report.moved(), 0);
        assert!(matches!(report.outcomes[..], [MoveOutcome::AlreadyInPlace]));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_symlink_is_sorted_like_the_watcher_does() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().expect("Failed to create temp directory");
        let target = outside.path().join("x.pdf");
        fs::write(&target, "pdf").unwrap();

        let scanned = TempDir::new().expect("Failed to create temp directory");
        let watched = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();
        symlink(&target, scanned.path().join("link.pdf")).unwrap();
        symlink(&target, watched.path().join("link.pdf")).unwrap();

        let report = scan(scanned.path(), &rules, &log).expect("scan should succeed");
        let watch_outcome = FileOrganizer::new(watched.path(), &rules, &log)
            .relocate(&watched.path().join("link.pdf"), Trigger::Watch);

        assert_eq!(report.moved(), 1);
        assert!(watch_outcome.is_moved());
        for root in [scanned.path(), watched.path()] {
            assert!(!root.join("link.pdf").exists());
            assert!(fs::symlink_metadata(root.join("Documents/link.pdf")).is_ok());
        }
        assert!(target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_skipped() {
        use std::os::unix::fs::symlink;

        let root = TempDir::new().expect("Failed to create temp directory");
        let log_dir = TempDir::new().expect("Failed to create temp directory");
        let log = open_log(&log_dir);
        let rules = RuleTable::with_defaults();
        symlink(root.path().join("gone.pdf"), root.path().join("dangling.pdf")).unwrap();

        let report = scan(root.path(), &rules, &log).expect("scan should succeed");
        let watch_outcome = FileOrganizer::new(root.path(), &rules, &log)
            .relocate(&root.path().join("dangling.pdf"), Trigger::Watch);

        assert!(report.outcomes.is_empty());
        assert!(matches!(watch_outcome, MoveOutcome::Vanished));
        assert!(fs::symlink_metadata(root.path().join("dangling.pdf")).is_ok());
    }
}
