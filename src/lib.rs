//! dlsort - keeps a downloads folder tidy
//!
//! This library sorts the files in a watched directory into category
//! subfolders chosen by file extension, either in one pass or continuously
//! as new files arrive, and keeps a user-editable rule file and an activity
//! log of every move.

pub mod activity_log;
pub mod cli;
pub mod config;
pub mod engine;
pub mod file_organizer;
pub mod output;
pub mod rules;
pub mod scanner;
pub mod watcher;

pub use config::{ConfigError, EnginePaths};
pub use engine::{EngineError, SortEngine};
pub use file_organizer::{FileOrganizer, MoveError, MoveOutcome};
pub use rules::RuleTable;
pub use scanner::{PlannedMove, ScanError, ScanReport};
pub use watcher::WatchError;

pub use cli::{Command, run_cli};
