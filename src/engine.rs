//! The sorting engine: the public surface the shell drives.
//!
//! An engine owns one watched directory, its rule table, its activity log
//! and at most one live watcher. Several engines with different directories
//! can coexist in one process.

use crate::activity_log::ActivityLog;
use crate::config::{self, ConfigError, EnginePaths};
use crate::rules::RuleTable;
use crate::scanner::{self, PlannedMove, ScanError, ScanReport};
use crate::watcher::{FolderWatcher, WatchError};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Errors creating an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to open activity log {}: {source}", path.display())]
    LogOpen { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct SortEngine {
    root: PathBuf,
    rules_file: PathBuf,
    rules: Arc<RuleTable>,
    log: Arc<ActivityLog>,
    watcher: Mutex<Option<FolderWatcher>>,
}

impl SortEngine {
    /// Creates an engine seeded with the default rules.
    ///
    /// Opens (and if needed creates) the activity log. The rule file is not read;
    /// call [`SortEngine::load_rules_from_file`] for that.
    pub fn new(paths: EnginePaths) -> Result<Self, EngineError> {
        Self::with_rules(paths, RuleTable::with_defaults())
    }

    /// Creates an engine with an explicit starting rule table.
    pub fn with_rules(paths: EnginePaths, rules: RuleTable) -> Result<Self, EngineError> {
        let log = ActivityLog::open(&paths.log_file).map_err(|source| EngineError::LogOpen {
            path: paths.log_file.clone(),
            source,
        })?;
        debug!(root = %paths.watched_root.display(), "engine created");
        Ok(Self {
            root: paths.watched_root,
            rules_file: paths.rules_file,
            rules: Arc::new(rules),
            log: Arc::new(log),
            watcher: Mutex::new(None),
        })
    }

    /// Creates an engine over the standard per-user locations.
    pub fn for_current_user() -> Result<Self, EngineError> {
        Self::new(EnginePaths::for_current_user()?)
    }

    pub fn watched_root(&self) -> &Path {
        &self.root
    }

    pub fn rules_file(&self) -> &Path {
        &self.rules_file
    }

    pub fn log_file(&self) -> &Path {
        self.log.path()
    }

    /// Sorts every file currently in the watched directory and returns how many moved.
    pub fn run(&self) -> Result<usize, ScanError> {
        self.scan().map(|report| report.moved())
    }

    /// Like [`SortEngine::run`] but returns the outcome of every file.
    pub fn scan(&self) -> Result<ScanReport, ScanError> {
        scanner::scan(&self.root, &self.rules, &self.log)
    }

    /// Lists the moves a scan would make right now, without making them.
    pub fn plan(&self) -> Result<Vec<PlannedMove>, ScanError> {
        scanner::plan(&self.root, &self.rules, &self.log)
    }

    /// Starts sorting new files as they appear. No-op if already watching.
    pub fn start_watcher(&self) -> Result<(), WatchError> {
        let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("watcher already running");
            return Ok(());
        }
        let watcher = FolderWatcher::start(
            self.root.clone(),
            Arc::clone(&self.rules),
            Arc::clone(&self.log),
        )?;
        *slot = Some(watcher);
        self.log.record("Watcher started");
        info!(root = %self.root.display(), "watching for new files");
        Ok(())
    }

    /// Stops the watcher and waits for it to wind down. No-op if not watching.
    pub fn stop_watcher(&self) {
        // Held until the dispatch thread has joined so no second watcher can start meanwhile.
        let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(watcher) = slot.take() {
            watcher.stop();
            self.log.record("Watcher stopped");
            info!(root = %self.root.display(), "stopped watching");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// A copy of the current rules.
    pub fn rules(&self) -> BTreeMap<String, String> {
        self.rules.snapshot()
    }

    /// Merges rules in; a blank folder deletes that extension's rule.
    pub fn set_rules<I, K, V>(&self, rules: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.rules
            .apply(rules.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Merges the rule file over the current rules. A missing file is not an error.
    ///
    /// On a parse error the current rules are left untouched.
    pub fn load_rules_from_file(&self) -> Result<(), ConfigError> {
        if let Some(loaded) = config::load_rules(&self.rules_file)? {
            info!(path = %self.rules_file.display(), count = loaded.len(), "rules loaded");
            self.rules.apply(loaded);
        }
        Ok(())
    }

    /// Writes the full rule table to the rule file.
    pub fn save_rules_to_file(&self) -> Result<(), ConfigError> {
        config::save_rules(&self.rules_file, &self.rules.snapshot())
    }
}

impl Drop for SortEngine {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}
