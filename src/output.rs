//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: coloured status lines
//! and the tables printed after a sort or when listing rules.

use colored::*;
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dlsort::output::OutputFormatter;
    /// OutputFormatter::success("Moved 3 file(s)");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints how many files went to each folder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dlsort::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(folder_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = folder_counts
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max(6); // "Folder"

        println!("{:<width$} | {}", "Folder".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));

        for (folder, count) in folder_counts {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count)
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files)
        );
    }

    /// Prints the rule table as `extension → folder` rows.
    pub fn rules_table(rules: &BTreeMap<String, String>) {
        if rules.is_empty() {
            Self::warning("No rules configured.");
            return;
        }

        let width = rules
            .keys()
            .map(|ext| ext.chars().count())
            .max()
            .unwrap_or(0)
            .max(9); // "Extension"

        println!("{:<width$} | {}", "Extension".bold(), "Folder".bold());
        println!("{}", "-".repeat(width + 16));
        for (ext, folder) in rules {
            println!("{:<width$} | {}", ext.cyan(), folder);
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
