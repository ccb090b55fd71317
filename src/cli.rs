//! Command-line shell for dlsort.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing
//! - Sort now (optionally as a dry run)
//! - Watch mode until Ctrl-C
//! - Rule editing
//! - Showing the activity log
//!
//! Every command goes through the public [`SortEngine`] operations only.

use crate::engine::SortEngine;
use crate::output::OutputFormatter;
use crate::rules::normalize_extension;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;

/// Sort a downloads folder into category subfolders by file extension.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Sort this directory instead of the user's Downloads folder.
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    /// Increase diagnostic output (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Represents a CLI command to execute.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sort every file currently in the folder, then save the rules.
    Sort {
        /// Show what would be moved without moving anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Keep sorting new files as they arrive until interrupted.
    Watch,
    /// Show or edit the sorting rules.
    #[command(subcommand)]
    Rules(RulesCommand),
    /// Show where the activity log lives and its most recent lines.
    Log {
        /// Number of trailing lines to print.
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesCommand {
    /// List every rule.
    List,
    /// Add or change the folder for an extension.
    Set {
        /// Extension, with or without the leading dot (e.g. `.pdf`).
        extension: String,
        /// Folder name inside the watched directory.
        folder: String,
    },
    /// Remove the rule for an extension.
    Remove { extension: String },
}

pub fn parse() -> Args {
    Args::parse()
}

/// Runs one command against `engine`.
///
/// # Examples
///
/// ```no_run
/// use dlsort::cli::{run_cli, Command};
/// use dlsort::config::EnginePaths;
/// use dlsort::engine::SortEngine;
///
/// let engine = SortEngine::new(EnginePaths::for_current_user().unwrap()).unwrap();
/// if let Err(e) = run_cli(Command::Sort { dry_run: true }, &engine) {
///     eprintln!("Error: {e:#}");
/// }
/// ```
pub fn run_cli(command: Command, engine: &SortEngine) -> Result<()> {
    match command {
        Command::Sort { dry_run: true } => sort_dry_run(engine),
        Command::Sort { dry_run: false } => sort_now(engine),
        Command::Watch => watch(engine),
        Command::Rules(rules) => edit_rules(rules, engine),
        Command::Log { lines } => show_log(engine, lines),
    }
}

/// Loads the saved rules, a missing file being fine.
fn load_rules(engine: &SortEngine) -> Result<()> {
    engine.load_rules_from_file().with_context(|| {
        format!(
            "Error loading rules from {}",
            engine.rules_file().display()
        )
    })
}

fn save_rules(engine: &SortEngine) -> Result<()> {
    engine
        .save_rules_to_file()
        .with_context(|| format!("Error saving rules to {}", engine.rules_file().display()))
}

/// Sorts everything now and saves the rules afterwards.
fn sort_now(engine: &SortEngine) -> Result<()> {
    load_rules(engine)?;
    OutputFormatter::info(&format!(
        "Sorting contents of: {}",
        engine.watched_root().display()
    ));

    let report = engine.scan().context("Sort failed")?;
    save_rules(engine)?;

    let moved = report.moved();
    if moved == 0 {
        OutputFormatter::plain("No files needed sorting.");
    } else {
        OutputFormatter::summary_table(&report.moved_by_folder(), moved);
    }

    let failed = report.failed();
    if failed > 0 {
        OutputFormatter::warning(&format!(
            "{failed} file(s) could not be moved. See {} for details.",
            engine.log_file().display()
        ));
    }
    OutputFormatter::success(&format!("Moved {moved} file(s)."));
    Ok(())
}

fn sort_dry_run(engine: &SortEngine) -> Result<()> {
    load_rules(engine)?;
    OutputFormatter::dry_run_notice(&format!(
        "Analyzing contents of: {}",
        engine.watched_root().display()
    ));

    let planned = engine.plan().context("Dry run failed")?;
    if planned.is_empty() {
        OutputFormatter::plain("No files found to sort.");
        return Ok(());
    }

    let mut counts = std::collections::BTreeMap::new();
    for entry in &planned {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        OutputFormatter::plain(&format!(" - {name}"));
        OutputFormatter::plain(&format!("   → Would move to {}/", entry.folder));
        *counts.entry(entry.folder.clone()).or_insert(0) += 1;
    }

    OutputFormatter::summary_table(&counts, planned.len());
    OutputFormatter::dry_run_notice("No files were modified.");
    Ok(())
}

/// Watches until Ctrl-C, then stops the watcher cleanly.
fn watch(engine: &SortEngine) -> Result<()> {
    load_rules(engine)?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    engine.start_watcher().with_context(|| {
        format!(
            "Failed to watch {}",
            engine.watched_root().display()
        )
    })?;
    OutputFormatter::info(&format!(
        "Watching {} for new files. Press Ctrl-C to stop.",
        engine.watched_root().display()
    ));

    // Either a signal or the handler being dropped ends the wait.
    let _ = rx.recv();
    engine.stop_watcher();
    OutputFormatter::success("Watcher stopped.");
    Ok(())
}

fn edit_rules(command: RulesCommand, engine: &SortEngine) -> Result<()> {
    load_rules(engine)?;
    match command {
        RulesCommand::List => {
            OutputFormatter::plain(&format!(
                "Rules file: {}",
                engine.rules_file().display()
            ));
            OutputFormatter::rules_table(&engine.rules());
        }
        RulesCommand::Set { extension, folder } => {
            if normalize_extension(&extension).is_none() {
                anyhow::bail!("'{extension}' is not a file extension");
            }
            if folder.trim().is_empty() {
                anyhow::bail!("Folder name must not be empty; use `rules remove` to delete a rule");
            }
            engine.set_rules([(extension.clone(), folder.clone())]);
            save_rules(engine)?;
            OutputFormatter::success(&format!("{extension} → {}", folder.trim()));
        }
        RulesCommand::Remove { extension } => {
            engine.set_rules([(extension.clone(), String::new())]);
            save_rules(engine)?;
            OutputFormatter::success(&format!("Removed rule for {extension}"));
        }
    }
    Ok(())
}

fn show_log(engine: &SortEngine, lines: usize) -> Result<()> {
    let path = engine.log_file();
    OutputFormatter::plain(&format!("Log file: {}", path.display()));

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            OutputFormatter::plain("No log file found.");
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Unable to open log {}", path.display()));
        }
    };
    if content.trim().is_empty() {
        OutputFormatter::plain("No log entries yet.");
        return Ok(());
    }

    let all: Vec<&str> = content.lines().collect();
    for line in &all[all.len().saturating_sub(lines)..] {
        OutputFormatter::plain(line);
    }
    Ok(())
}
