/// Extension rule table for deciding where files are sorted to.
///
/// This module maps lowercase, dot-prefixed file extensions (e.g. `.pdf`) to the
/// name of a destination folder inside the watched directory.
///
/// # Examples
///
/// ```
/// use dlsort::rules::RuleTable;
///
/// let rules = RuleTable::with_defaults();
/// assert_eq!(rules.destination_for(".png"), Some("Images".to_string()));
/// assert_eq!(rules.destination_for(".PDF"), Some("Documents".to_string()));
/// assert_eq!(rules.destination_for(".xyz"), None);
/// ```
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Rule set seeded into every new engine before any file-based load.
pub const DEFAULT_RULES: &[(&str, &str)] = &[
    (".pdf", "Documents"),
    (".drawio", "Documents"),
    (".pptx", "Documents"),
    (".docx", "Documents"),
    (".xlsx", "Spreadsheets"),
    (".csv", "Spreadsheets"),
    (".exe", "Installers"),
    (".msi", "Installers"),
    (".zip", "ZIP Files"),
    (".iso", "Installers"),
    (".jpg", "Images"),
    (".jpeg", "Images"),
    (".png", "Images"),
    (".gif", "GIFs"),
    (".mp4", "Videos"),
    (".mp3", "Audio"),
    (".wav", "Audio"),
    (".m4a", "Audio"),
    (".html", "WebDownloads"),
    (".htm", "WebDownloads"),
    (".json", "WebDownloads"),
    (".3mf", "BambuStudio"),
];

/// Normalizes a user-supplied extension into a rule key.
///
/// Keys are trimmed, lowercased and always carry exactly one leading dot.
/// Returns `None` for keys that cannot name an extension (empty or a bare dot).
///
/// ```
/// use dlsort::rules::normalize_extension;
///
/// assert_eq!(normalize_extension(" .PNG "), Some(".png".to_string()));
/// assert_eq!(normalize_extension("pdf"), Some(".pdf".to_string()));
/// assert_eq!(normalize_extension("."), None);
/// ```
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed).trim();
    if bare.is_empty() {
        return None;
    }
    Some(format!(".{}", bare.to_lowercase()))
}

/// Returns the rule key for a file path, or an empty string if it has no extension.
///
/// Follows `Path::extension`, so dotfiles such as `.bashrc` have no extension.
pub fn extension_key(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Runtime-mutable table of extension → destination folder rules.
///
/// Reads happen on every move and writes only when rules are edited or
/// loaded, so the map sits behind a reader/writer lock. A poisoned lock is
/// recovered since the map is always left in a consistent state.
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: RwLock<BTreeMap<String, String>>,
}

impl RuleTable {
    /// Creates a table with no rules.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a table seeded with [`DEFAULT_RULES`].
    pub fn with_defaults() -> Self {
        let table = Self::empty();
        table.apply(
            DEFAULT_RULES
                .iter()
                .map(|(ext, folder)| (ext.to_string(), folder.to_string())),
        );
        table
    }

    /// Returns the destination folder configured for an extension key.
    ///
    /// The key is normalized first, so `.PNG` and `png` both find the `.png` rule.
    pub fn destination_for(&self, extension: &str) -> Option<String> {
        let key = normalize_extension(extension)?;
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Returns a copy of every rule. Changes to the copy do not affect the table.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merges rules into the table.
    ///
    /// Each entry is applied on its own: a blank (or whitespace-only) folder
    /// removes the extension's rule, anything else inserts or overwrites it.
    /// Entries whose key is not a usable extension are skipped.
    pub fn apply<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        for (raw_ext, raw_folder) in entries {
            let Some(ext) = normalize_extension(&raw_ext) else {
                warn!(extension = %raw_ext, "ignoring rule with an empty extension");
                continue;
            };
            let folder = raw_folder.trim();
            if folder.is_empty() {
                if rules.remove(&ext).is_some() {
                    debug!(extension = %ext, "rule removed");
                }
            } else {
                rules.insert(ext, folder.to_string());
            }
        }
    }

    /// Number of rules currently in the table.
    pub fn len(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
