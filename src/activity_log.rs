/// Append-only activity log shared by the scanner and the watcher.
///
/// Every entry is a single `yyyy-MM-dd HH:mm:ss <message>` line. Writers
/// serialize on one mutex and each line goes out in a single write, so lines
/// from concurrent scans and watcher callbacks never interleave.
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ActivityLog {
    /// Opens (or creates) the log file for appending, creating its parent directory.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one timestamped line.
    ///
    /// A failed write is reported through tracing and otherwise ignored; losing a
    /// log line must not stop a move.
    pub fn record(&self, message: &str) {
        info!(target: "dlsort::activity", "{message}");
        let line = format!("{} {}\n", Local::now().format(TIMESTAMP_FORMAT), message);

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "failed to append to activity log");
        }
    }
}
