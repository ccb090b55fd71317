/// Moves single files into their rule's destination folder.
///
/// This module is shared by the one-shot scanner and the live watcher so both
/// paths sort a file in exactly the same way: look up the extension, create
/// the destination folder, pick a free name and move the file, writing one
/// activity log line per attempted move.
use crate::activity_log::ActivityLog;
use crate::rules::{RuleTable, extension_key};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Which execution path asked for the move. Only changes the log wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// One-shot sort of the whole folder.
    Scan,
    /// Creation notification from the watcher.
    Watch,
}

/// Errors for a single file. These are reported in [`MoveOutcome::Failed`],
/// never returned to the scanner or watcher as a hard error.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Failed to create the destination folder.
    #[error("cannot create folder '{}': {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// The rename (or copy fallback) failed.
    #[error("cannot move to '{}': {source}", destination.display())]
    FileMoveFailure {
        destination: PathBuf,
        source: io::Error,
    },

    /// The path has no final file name component.
    #[error("path has no file name")]
    MissingFileName,
}

/// What happened to one file.
#[derive(Debug)]
pub enum MoveOutcome {
    /// The file now lives at `destination`.
    Moved {
        source: PathBuf,
        destination: PathBuf,
    },
    /// No rule for the file's extension; left in place.
    Unmatched,
    /// The rule points at the folder the file is already in.
    AlreadyInPlace,
    /// The file was gone (or no longer a regular file) by the time we got to it.
    Vanished,
    /// The move was attempted and failed.
    Failed { source: PathBuf, error: MoveError },
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MoveOutcome::Failed { .. })
    }
}

/// Sorts files that live directly in `root`.
///
/// # Examples
///
/// ```no_run
/// use dlsort::activity_log::ActivityLog;
/// use dlsort::file_organizer::{FileOrganizer, MoveOutcome, Trigger};
/// use dlsort::rules::RuleTable;
/// use std::path::Path;
///
/// let rules = RuleTable::with_defaults();
/// let log = ActivityLog::open("/tmp/dlsort.log").unwrap();
/// let organizer = FileOrganizer::new(Path::new("/home/me/Downloads"), &rules, &log);
///
/// match organizer.relocate(Path::new("/home/me/Downloads/photo.png"), Trigger::Scan) {
///     MoveOutcome::Moved { destination, .. } => println!("now at {}", destination.display()),
///     other => println!("not moved: {other:?}"),
/// }
/// ```
pub struct FileOrganizer<'a> {
    root: &'a Path,
    rules: &'a RuleTable,
    log: &'a ActivityLog,
}

impl<'a> FileOrganizer<'a> {
    pub fn new(root: &'a Path, rules: &'a RuleTable, log: &'a ActivityLog) -> Self {
        Self { root, rules, log }
    }

    /// Destination folder name for `file_path`, if a rule matches it.
    pub fn folder_for(&self, file_path: &Path) -> Option<String> {
        let ext = extension_key(file_path);
        if ext.is_empty() {
            return None;
        }
        self.rules.destination_for(&ext)
    }

    /// Like [`FileOrganizer::folder_for`], but `None` when the rule points at the
    /// folder the file already sits in, so nothing would move.
    pub fn planned_folder(&self, file_path: &Path) -> Option<String> {
        let folder = self.folder_for(file_path)?;
        let file_name = file_path.file_name()?;
        if is_same_file(&self.root.join(&folder).join(file_name), file_path) {
            return None;
        }
        Some(folder)
    }

    /// Moves `file_path` into the folder its extension maps to.
    ///
    /// Unmatched, vanished and already-sorted files are left alone without a log
    /// line. Every attempted move writes exactly one line, success or failure.
    pub fn relocate(&self, file_path: &Path, trigger: Trigger) -> MoveOutcome {
        let Some(folder) = self.folder_for(file_path) else {
            trace!(path = %file_path.display(), "no rule for file");
            return MoveOutcome::Unmatched;
        };

        // Notifications can race with the producer renaming or deleting the file.
        if !file_path.is_file() {
            debug!(path = %file_path.display(), "file vanished before it could be sorted");
            return MoveOutcome::Vanished;
        }

        match self.move_into(file_path, &folder) {
            Ok(Some(destination)) => {
                let verb = match trigger {
                    Trigger::Scan => "Moved",
                    Trigger::Watch => "Watcher moved",
                };
                self.log.record(&format!(
                    "{verb} '{}' to '{}'",
                    file_path.display(),
                    destination.display()
                ));
                MoveOutcome::Moved {
                    source: file_path.to_path_buf(),
                    destination,
                }
            }
            Ok(None) => MoveOutcome::AlreadyInPlace,
            Err(error) => {
                let prefix = match trigger {
                    Trigger::Scan => "Error moving",
                    Trigger::Watch => "Watcher error moving",
                };
                self.log
                    .record(&format!("{prefix} '{}': {error}", file_path.display()));
                warn!(path = %file_path.display(), %error, "move failed");
                MoveOutcome::Failed {
                    source: file_path.to_path_buf(),
                    error,
                }
            }
        }
    }

    /// Returns the new path, or `None` when the file already sits where the rule points.
    fn move_into(&self, file_path: &Path, folder: &str) -> Result<Option<PathBuf>, MoveError> {
        let category_path = self.root.join(folder);
        fs::create_dir_all(&category_path).map_err(|e| MoveError::DirectoryCreationFailed {
            path: category_path.clone(),
            source: e,
        })?;

        let file_name = file_path.file_name().ok_or(MoveError::MissingFileName)?;
        if is_same_file(&category_path.join(file_name), file_path) {
            return Ok(None);
        }

        // Best-effort: another mover can take the name between the check and the rename.
        let destination = resolve_destination(&category_path, Path::new(file_name));
        move_file(file_path, &destination).map_err(|e| MoveError::FileMoveFailure {
            destination: destination.clone(),
            source: e,
        })?;
        Ok(Some(destination))
    }
}

/// Returns a free path for `name` inside `dir`.
///
/// Uses `dir/name` if nothing is there, otherwise tries `"stem (1).ext"`,
/// `"stem (2).ext"`, ... checking the filesystem again for every candidate.
///
/// ```no_run
/// use dlsort::file_organizer::resolve_destination;
/// use std::path::Path;
///
/// // With Documents/report.pdf already present:
/// let free = resolve_destination(Path::new("Downloads/Documents"), Path::new("report.pdf"));
/// assert!(free.ends_with("report (1).pdf"));
/// ```
pub fn resolve_destination(dir: &Path, name: &Path) -> PathBuf {
    let candidate = dir.join(name);
    if !is_occupied(&candidate) {
        return candidate;
    }

    let stem: OsString = name
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| name.as_os_str().to_os_string());
    let ext = name.extension();

    let mut n: u64 = 1;
    loop {
        let mut numbered = stem.clone();
        numbered.push(format!(" ({n})"));
        if let Some(ext) = ext {
            numbered.push(".");
            numbered.push(ext);
        }
        let candidate = dir.join(&numbered);
        if !is_occupied(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Anything at `path`, including a dangling symlink, counts as taken.
fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Renames, falling back to copy + remove when crossing filesystems.
fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(src = %src.display(), dest = %dest.display(), "cross-device move, copying");
            fs::copy(src, dest)?;
            if let Err(e) = fs::remove_file(src) {
                // Don't leave two copies behind.
                let _ = fs::remove_file(dest);
                return Err(e);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
