//! Command-line interface module for folderchronicle.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Applying flags on top of the loaded configuration
//! - Running a sort, a standalone backup, or a directory listing
//! - Rendering progress, per-file outcomes, and the final summary

use crate::backup::BackupManager;
use crate::bucket::TimestampSource;
use crate::config::{AppConfig, ConfigError};
use crate::file_organizer::{
    self, FileOrganizer, OrganizeError, OrganizeOptions, RunReport, TransferAction,
    TransferMode, TransferRecord,
};
use crate::output::OutputFormatter;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sort the files of a directory into Year/Month folders.
#[derive(Debug, Parser)]
#[command(name = "folderchronicle", version, about)]
pub struct Cli {
    /// Configuration file (default: .folderchroniclerc.toml, then ~/.config/folderchronicle/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sort files into YYYY/MM folders by timestamp
    Sort(SortArgs),
    /// Copy the whole directory to a timestamped backup next to it
    Backup {
        /// Directory to back up (default: last sorted directory)
        directory: Option<PathBuf>,
    },
    /// List the subdirectories of a directory
    Dirs {
        /// Directory to list (default: last sorted directory)
        directory: Option<PathBuf>,
    },
}

#[derive(Debug, Args, Clone, Default)]
pub struct SortArgs {
    /// Directory to sort (default: last sorted directory)
    pub directory: Option<PathBuf>,

    /// Copy files into their folders and keep the originals (no backup by default)
    #[arg(long)]
    pub copy: bool,

    /// Back up the directory before sorting
    #[arg(long, overrides_with = "no_backup")]
    pub backup: bool,

    /// Do not back up the directory before sorting
    #[arg(long, overrides_with = "backup")]
    pub no_backup: bool,

    /// Use the creation time instead of the modification time
    #[arg(long)]
    pub created: bool,

    /// Also sort files in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Show where files would go without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Command {
    /// The directory given on the command line, if any.
    pub fn directory(&self) -> Option<&Path> {
        match self {
            Command::Sort(args) => args.directory.as_deref(),
            Command::Backup { directory } | Command::Dirs { directory } => directory.as_deref(),
        }
    }

    /// The command to run once the directory is known.
    pub fn to_organize_command(&self) -> OrganizeCommand {
        match self {
            Command::Sort(args) => OrganizeCommand::Sort(SortFlags::from(args)),
            Command::Backup { .. } => OrganizeCommand::Backup,
            Command::Dirs { .. } => OrganizeCommand::ListDirs,
        }
    }
}

/// Sort flags that override the configuration. `None` keeps the configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortFlags {
    pub mode: Option<TransferMode>,
    pub backup: Option<bool>,
    pub timestamp_source: Option<TimestampSource>,
    pub recursive: bool,
    pub dry_run: bool,
    pub json: bool,
}

impl From<&SortArgs> for SortFlags {
    fn from(args: &SortArgs) -> Self {
        let backup = match (args.backup, args.no_backup) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Self {
            mode: args.copy.then_some(TransferMode::Copy),
            backup,
            timestamp_source: args.created.then_some(TimestampSource::Created),
            recursive: args.recursive,
            dry_run: args.dry_run,
            json: args.json,
        }
    }
}

impl SortFlags {
    /// Applies these flags on top of `config`.
    ///
    /// Choosing a mode on the command line resets the backup default to
    /// that mode's policy unless a backup flag was also given.
    pub fn apply(&self, config: &AppConfig) -> OrganizeOptions {
        let mut options = config.organize_options();
        if let Some(mode) = self.mode {
            options.mode = mode;
            options.backup = config
                .organize
                .backup
                .unwrap_or_else(|| mode.backs_up_by_default());
        }
        if let Some(backup) = self.backup {
            options.backup = backup;
        }
        if let Some(source) = self.timestamp_source {
            options.timestamp_source = source;
        }
        options.recursive |= self.recursive;
        options.dry_run = self.dry_run;
        options
    }
}

/// Represents a CLI command to execute against a resolved directory.
#[derive(Debug, Clone, Copy)]
pub enum OrganizeCommand {
    /// Sort files into year/month folders.
    Sort(SortFlags),
    /// Back up the directory only.
    Backup,
    /// List subdirectories for folder selection.
    ListDirs,
}

/// Whether a command completed cleanly or some files failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Clean,
    WithFailures,
}

/// Fatal CLI errors. Nothing was changed when one of these is returned.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Error loading configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Organize(#[from] OrganizeError),
    #[error("Error writing JSON report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No directory given and no previously used directory remembered")]
    MissingDirectory,
}

/// Runs the CLI application with the given command and directory path.
///
/// # Examples
///
/// ```no_run
/// use folderchronicle::cli::{run_cli, OrganizeCommand, SortFlags};
/// use std::path::Path;
///
/// let result = run_cli(OrganizeCommand::Sort(SortFlags::default()), Path::new("/path/to/directory"));
/// match result {
///     Ok(status) => println!("Finished: {:?}", status),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: OrganizeCommand, dir_path: &Path) -> Result<RunStatus, CliError> {
    run_cli_with_config(command, dir_path, None)
}

/// Runs the CLI application with an optional configuration file.
pub fn run_cli_with_config(
    command: OrganizeCommand,
    dir_path: &Path,
    config_path: Option<&Path>,
) -> Result<RunStatus, CliError> {
    let config = AppConfig::load(config_path)?;
    match command {
        OrganizeCommand::Sort(flags) => sort_directory(dir_path, &config, flags),
        OrganizeCommand::Backup => backup_directory(dir_path, &config),
        OrganizeCommand::ListDirs => list_directories(dir_path),
    }
}

/// Sorts a directory and prints each outcome and a summary.
fn sort_directory(
    base_path: &Path,
    config: &AppConfig,
    flags: SortFlags,
) -> Result<RunStatus, CliError> {
    let filters = config.compile_filters()?;
    let options = flags.apply(config);
    let organizer = FileOrganizer::new(options, filters);
    let options = organizer.options();

    if flags.json {
        let report = organizer.run(base_path)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(status_of(&report));
    }

    if options.dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Analyzing contents of: {}",
            base_path.display()
        ));
    } else {
        OutputFormatter::info(&format!("Sorting contents of: {}", base_path.display()));
    }

    let progress = OutputFormatter::create_progress_bar(0);
    if options.backup && !options.dry_run {
        progress.set_message("backing up");
    }
    let result = organizer.run_with_progress(base_path, |done, total, record| {
        progress.set_length(total as u64);
        progress.set_position(done as u64);
        progress.set_message(display_name(&record.source));
    });
    progress.finish_and_clear();
    let report = result?;

    print_report(&report);
    Ok(status_of(&report))
}

fn status_of(report: &RunReport) -> RunStatus {
    if report.has_failures() {
        RunStatus::WithFailures
    } else {
        RunStatus::Clean
    }
}

fn print_report(report: &RunReport) {
    if report.records.is_empty() {
        OutputFormatter::plain("No files found.");
        return;
    }

    if let Some(backup) = &report.backup {
        OutputFormatter::success(&format!(
            "Backup created at {} ({} {})",
            backup.path.display(),
            backup.files_copied,
            if backup.files_copied == 1 { "file" } else { "files" }
        ));
    }

    OutputFormatter::header("FILES");
    for record in &report.records {
        print_record(&report.root, record);
    }

    let rows: Vec<(&str, usize)> = TransferAction::ALL
        .iter()
        .map(|action| (action.label(), report.count(*action)))
        .collect();
    OutputFormatter::summary_table(&rows, report.records.len());

    let failed = report.count(TransferAction::Failed);
    if report.dry_run {
        OutputFormatter::dry_run_notice("Dry run complete. No files were modified.");
    } else {
        let action = match report.mode {
            TransferMode::Move => "Moved",
            TransferMode::Copy => "Copied",
        };
        let summary = format!(
            "Done. {} {} file(s). Errors: {}.",
            action,
            report.transferred(),
            failed
        );
        if failed > 0 {
            OutputFormatter::warning(&summary);
        } else {
            OutputFormatter::success(&summary);
        }
    }

    if failed > 0 {
        OutputFormatter::header("FAILURES");
        for (path, reason) in report.failures() {
            OutputFormatter::error(&format!("{}: {}", path.display(), reason));
        }
    }
}

fn print_record(root: &Path, record: &TransferRecord) {
    let name = display_name(&record.source);
    let destination = record
        .destination
        .as_deref()
        .map(|dest| {
            dest.strip_prefix(root)
                .unwrap_or(dest)
                .display()
                .to_string()
        })
        .unwrap_or_default();
    let reason = record.reason.as_deref().unwrap_or_default();

    match record.action {
        TransferAction::Moved => {
            OutputFormatter::success(&format!("Moved: {} -> {}", name, destination))
        }
        TransferAction::Copied => {
            OutputFormatter::success(&format!("Copied: {} -> {}", name, destination))
        }
        TransferAction::Planned => {
            OutputFormatter::dry_run_notice(&format!("Would place {} at {}", name, destination))
        }
        TransferAction::Skipped => {
            OutputFormatter::warning(&format!("Skipped: {} ({})", name, reason))
        }
        TransferAction::Failed => OutputFormatter::error(&format!("Failed: {} ({})", name, reason)),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn backup_directory(base_path: &Path, config: &AppConfig) -> Result<RunStatus, CliError> {
    OutputFormatter::info(&format!("Backing up: {}", base_path.display()));
    let report = BackupManager::backup(base_path, &config.backup)?;
    OutputFormatter::success(&format!(
        "Backup created at {} ({} files, {} bytes)",
        report.path.display(),
        report.files_copied,
        report.bytes_copied
    ));
    Ok(RunStatus::Clean)
}

fn list_directories(base_path: &Path) -> Result<RunStatus, CliError> {
    let dirs = file_organizer::list_directories(base_path)?;
    if dirs.is_empty() {
        OutputFormatter::plain("No subdirectories.");
        return Ok(RunStatus::Clean);
    }

    for dir in dirs {
        if file_organizer::holds_buckets(base_path, &dir) {
            OutputFormatter::plain(&format!("{}  (sorted)", dir.display()));
        } else {
            OutputFormatter::plain(&dir.display().to_string());
        }
    }
    Ok(RunStatus::Clean)
}
