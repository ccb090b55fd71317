//! Rule persistence and per-user locations.
//!
//! Rules are stored as a flat JSON object mapping extensions to folder names:
//!
//! ```json
//! {
//!   ".pdf": "Documents",
//!   ".png": "Images"
//! }
//! ```
//!
//! The rule file, the activity log and the watched directory all live in
//! platform-standard per-user locations resolved through `dirs`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const APP_DIR: &str = "dlsort";
const RULES_FILE_NAME: &str = "rules.json";
const LOG_FILE_NAME: &str = "dlsort.log";

/// Errors that can occur while reading or writing the rule file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The rule file exists but could not be read or written.
    #[error("IO error on rule file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The rule file exists but is not a JSON object of strings.
    #[error("Invalid rule file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The rule table could not be serialized.
    #[error("Failed to serialize rules: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The platform does not report a standard per-user directory.
    #[error("Could not determine the user's {0} directory")]
    NoStandardDirectory(&'static str),
}

/// On-disk shape of the rule file.
///
/// Values are optional so a `null` entry is accepted and treated as a removal.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct RulesDocument(BTreeMap<String, Option<String>>);

/// Reads the rule file at `path`.
///
/// Returns `Ok(None)` when the file does not exist. `null` values come back as
/// empty strings so they remove the rule when applied.
pub fn load_rules(path: &Path) -> Result<Option<BTreeMap<String, String>>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no rule file, keeping current rules");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let document: RulesDocument =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Some(
        document
            .0
            .into_iter()
            .map(|(ext, folder)| (ext, folder.unwrap_or_default()))
            .collect(),
    ))
}

/// Writes `rules` to `path` as indented JSON, creating parent directories.
pub fn save_rules(path: &Path, rules: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    let document = RulesDocument(
        rules
            .iter()
            .map(|(ext, folder)| (ext.clone(), Some(folder.clone())))
            .collect(),
    );
    let json = serde_json::to_string_pretty(&document)?;

    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, json).map_err(io_err)?;
    debug!(path = %path.display(), count = rules.len(), "rules saved");
    Ok(())
}

/// Locations the engine works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    /// Directory whose immediate files are sorted.
    pub watched_root: PathBuf,
    /// JSON rule file.
    pub rules_file: PathBuf,
    /// Append-only activity log.
    pub log_file: PathBuf,
}

impl EnginePaths {
    /// Builds paths from explicit locations.
    pub fn new(
        watched_root: impl Into<PathBuf>,
        rules_file: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            watched_root: watched_root.into(),
            rules_file: rules_file.into(),
            log_file: log_file.into(),
        }
    }

    /// Standard per-user locations:
    /// - watched root: the Downloads folder (`~/Downloads` if the platform has none)
    /// - rules: `<config dir>/dlsort/rules.json`
    /// - log: `<local data dir>/dlsort/logs/dlsort.log`
    pub fn for_current_user() -> Result<Self, ConfigError> {
        Ok(Self {
            watched_root: default_watched_root()?,
            rules_file: default_rules_path()?,
            log_file: default_log_path()?,
        })
    }

    /// Same as [`EnginePaths::for_current_user`] but watching `root` instead.
    pub fn for_current_user_watching(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            watched_root: root.into(),
            rules_file: default_rules_path()?,
            log_file: default_log_path()?,
        })
    }
}

/// The user's Downloads folder.
pub fn default_watched_root() -> Result<PathBuf, ConfigError> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .ok_or(ConfigError::NoStandardDirectory("downloads"))
}

/// OS-appropriate rule file path.
pub fn default_rules_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoStandardDirectory("config"))?;
    Ok(base.join(APP_DIR).join(RULES_FILE_NAME))
}

/// OS-appropriate activity log path.
pub fn default_log_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_local_dir().ok_or(ConfigError::NoStandardDirectory("local data"))?;
    Ok(base.join(APP_DIR).join("logs").join(LOG_FILE_NAME))
}
