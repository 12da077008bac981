//! Sorting files into year/month bucket directories.
//!
//! This module gathers the files of a directory, derives each file's bucket
//! from its timestamp, and moves or copies it into `root/YYYY/MM`. A failure
//! on one file is recorded and the batch carries on. Only an invalid root
//! directory or a failed backup stops a run, and both happen before any
//! file is touched.
use crate::backup::{self, BackupManager, BackupReport};
use crate::bucket::{self, Bucket, TimestampSource};
use crate::config::{BackupSettings, CompiledFilters};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

/// Whether files are moved or duplicated into their buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Move,
    Copy,
}

impl TransferMode {
    /// Moving takes a backup unless told otherwise; copying keeps the originals anyway.
    pub fn backs_up_by_default(&self) -> bool {
        matches!(self, TransferMode::Move)
    }

    fn verb(&self) -> &'static str {
        match self {
            TransferMode::Move => "move",
            TransferMode::Copy => "copy",
        }
    }
}

/// A file read once during a run.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub timestamp: SystemTime,
    pub size: u64,
}

impl FileEntry {
    /// Reads the metadata and the selected timestamp of `path`.
    pub fn read(path: &Path, source: TimestampSource) -> Result<Self, TransferError> {
        let metadata = fs::metadata(path).map_err(|e| TransferError::MetadataFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let timestamp = source
            .read(&metadata)
            .map_err(|e| TransferError::TimestampUnavailable {
                path: path.to_path_buf(),
                kind: source.label(),
                source: e,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            timestamp,
            size: metadata.len(),
        })
    }

    /// The bucket for this entry, or `None` if its timestamp has no
    /// four-digit local year.
    pub fn bucket(&self) -> Option<Bucket> {
        Bucket::from_system_time(self.timestamp)
    }
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAction {
    Moved,
    Copied,
    /// Dry run: the file would have been transferred to the recorded destination.
    Planned,
    Skipped,
    Failed,
}

impl TransferAction {
    pub const ALL: [TransferAction; 5] = [
        TransferAction::Moved,
        TransferAction::Copied,
        TransferAction::Planned,
        TransferAction::Skipped,
        TransferAction::Failed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransferAction::Moved => "Moved",
            TransferAction::Copied => "Copied",
            TransferAction::Planned => "Planned",
            TransferAction::Skipped => "Skipped",
            TransferAction::Failed => "Failed",
        }
    }
}

/// Outcome of one file's transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub source: PathBuf,
    /// Absent when the run failed before a destination was computed.
    pub destination: Option<PathBuf>,
    pub action: TransferAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TransferRecord {
    fn done(source: &Path, destination: PathBuf, action: TransferAction) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: Some(destination),
            action,
            reason: None,
        }
    }

    fn skipped(source: &Path, reason: String) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: None,
            action: TransferAction::Skipped,
            reason: Some(reason),
        }
    }

    fn failed(source: &Path, error: &TransferError) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: error.destination().map(Path::to_path_buf),
            action: TransferAction::Failed,
            reason: Some(error.to_string()),
        }
    }
}

/// Every record of one run, plus the backup taken before it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub mode: TransferMode,
    pub dry_run: bool,
    pub backup: Option<BackupReport>,
    pub records: Vec<TransferRecord>,
}

impl RunReport {
    fn new(root: &Path, options: &OrganizeOptions) -> Self {
        Self {
            root: root.to_path_buf(),
            mode: options.mode,
            dry_run: options.dry_run,
            backup: None,
            records: Vec::new(),
        }
    }

    pub fn count(&self, action: TransferAction) -> usize {
        self.records.iter().filter(|r| r.action == action).count()
    }

    /// Files moved or copied.
    pub fn transferred(&self) -> usize {
        self.count(TransferAction::Moved) + self.count(TransferAction::Copied)
    }

    pub fn has_failures(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.action == TransferAction::Failed)
    }

    /// Source path and reason of each failed file.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.records
            .iter()
            .filter(|r| r.action == TransferAction::Failed)
            .map(|r| (r.source.as_path(), r.reason.as_deref().unwrap_or("unknown error")))
    }
}

/// Per-file errors. These are recorded and never stop a run.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("cannot read metadata of {}: {source}", .path.display())]
    MetadataFailed { path: PathBuf, source: io::Error },
    #[error("no readable {kind} for {}: {source}", .path.display())]
    TimestampUnavailable {
        path: PathBuf,
        kind: &'static str,
        source: io::Error,
    },
    #[error("{kind} of {} is outside the years 0000-9999", .path.display())]
    TimestampOutOfRange { path: PathBuf, kind: &'static str },
    #[error("file has no name component: {}", .path.display())]
    MissingFileName { path: PathBuf },
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    #[error("unable to find a free name for {} in {}", .name.to_string_lossy(), .dir.display())]
    NoFreeName { dir: PathBuf, name: OsString },
    #[error("failed to {verb} {} to {}: {source}", .from.display(), .to.display())]
    TransferFailed {
        from: PathBuf,
        to: PathBuf,
        verb: &'static str,
        source: io::Error,
    },
}

impl TransferError {
    fn destination(&self) -> Option<&Path> {
        match self {
            TransferError::TransferFailed { to, .. } => Some(to),
            _ => None,
        }
    }
}

/// Whole-run errors, raised before any file is changed.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("invalid directory {}: {source}", .path.display())]
    InvalidRoot { path: PathBuf, source: io::Error },
    #[error("not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },
    #[error("failed to read directory {}: {source}", .path.display())]
    ReadDirFailed { path: PathBuf, source: io::Error },
    #[error("backup to {} failed: {source}", .path.display())]
    BackupFailed { path: PathBuf, source: io::Error },
}

/// Result type for whole-run operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Settings for one sort run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeOptions {
    pub mode: TransferMode,
    pub timestamp_source: TimestampSource,
    /// Also sort files in subdirectories, skipping existing `YYYY/MM` buckets.
    pub recursive: bool,
    /// Back up the whole directory before the first transfer.
    pub backup: bool,
    /// Compute destinations without touching the file system.
    pub dry_run: bool,
    pub backup_settings: BackupSettings,
}

impl OrganizeOptions {
    /// Options for `mode` with that mode's default backup policy.
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            backup: mode.backs_up_by_default(),
            ..Default::default()
        }
    }
}

/// Sorts the files of a directory into year/month buckets.
pub struct FileOrganizer {
    options: OrganizeOptions,
    filters: CompiledFilters,
}

impl FileOrganizer {
    pub fn new(options: OrganizeOptions, filters: CompiledFilters) -> Self {
        Self { options, filters }
    }

    /// An organizer that sorts every file it finds.
    pub fn with_options(options: OrganizeOptions) -> Self {
        Self::new(options, CompiledFilters::default())
    }

    pub fn options(&self) -> &OrganizeOptions {
        &self.options
    }

    /// Sorts `root` and returns one record per gathered file.
    ///
    /// # Errors
    ///
    /// Fails without touching any file when `root` is not a readable
    /// directory or when the requested backup cannot be completed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use folderchronicle::file_organizer::{FileOrganizer, OrganizeOptions, TransferMode};
    /// use std::path::Path;
    ///
    /// let organizer = FileOrganizer::with_options(OrganizeOptions::new(TransferMode::Move));
    /// match organizer.run(Path::new("/home/user/Downloads")) {
    ///     Ok(report) => println!("Moved {} file(s)", report.transferred()),
    ///     Err(e) => eprintln!("Nothing was changed: {}", e),
    /// }
    /// ```
    pub fn run(&self, root: &Path) -> OrganizeResult<RunReport> {
        self.run_with_progress(root, |_, _, _| {})
    }

    /// Like [`run`](Self::run), calling `on_record(done, total, record)` after each record.
    pub fn run_with_progress<F>(&self, root: &Path, mut on_record: F) -> OrganizeResult<RunReport>
    where
        F: FnMut(usize, usize, &TransferRecord),
    {
        validate_root(root)?;
        let files = gather_files(root, self.options.recursive)?;
        let total = files.len();
        tracing::info!(root = %root.display(), files = total, "gathered files");

        let mut report = RunReport::new(root, &self.options);
        let mut pending = Vec::with_capacity(total);

        for path in files {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            match self.filters.exclusion(relative) {
                Some(exclusion) => {
                    tracing::debug!(file = %path.display(), %exclusion, "skipping file");
                    let record = TransferRecord::skipped(&path, exclusion.to_string());
                    on_record(report.records.len() + 1, total, &record);
                    report.records.push(record);
                }
                None => pending.push(path),
            }
        }

        if pending.is_empty() {
            return Ok(report);
        }

        if self.options.backup && !self.options.dry_run {
            report.backup = Some(BackupManager::backup(root, &self.options.backup_settings)?);
        }

        let mut planned = HashSet::new();
        for path in pending {
            let record = self.transfer_one(root, &path, &mut planned);
            on_record(report.records.len() + 1, total, &record);
            report.records.push(record);
        }

        tracing::info!(
            root = %root.display(),
            transferred = report.transferred(),
            failed = report.count(TransferAction::Failed),
            "run complete"
        );
        Ok(report)
    }

    /// Transfers one file into its bucket under `root`.
    ///
    /// Never fails: errors become a [`TransferAction::Failed`] record.
    pub fn transfer_file(&self, root: &Path, file_path: &Path) -> TransferRecord {
        self.transfer_one(root, file_path, &mut HashSet::new())
    }

    fn transfer_one(
        &self,
        root: &Path,
        file_path: &Path,
        planned: &mut HashSet<PathBuf>,
    ) -> TransferRecord {
        match self.try_transfer(root, file_path, planned) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(file = %file_path.display(), error = %err, "transfer failed");
                TransferRecord::failed(file_path, &err)
            }
        }
    }

    fn try_transfer(
        &self,
        root: &Path,
        file_path: &Path,
        planned: &mut HashSet<PathBuf>,
    ) -> Result<TransferRecord, TransferError> {
        let entry = FileEntry::read(file_path, self.options.timestamp_source)?;
        let bucket = entry
            .bucket()
            .ok_or_else(|| TransferError::TimestampOutOfRange {
                path: file_path.to_path_buf(),
                kind: self.options.timestamp_source.label(),
            })?;
        let file_name = file_path
            .file_name()
            .ok_or_else(|| TransferError::MissingFileName {
                path: file_path.to_path_buf(),
            })?;
        let bucket_dir = bucket.dir_in(root);
        let no_free_name = || TransferError::NoFreeName {
            dir: bucket_dir.clone(),
            name: file_name.to_os_string(),
        };

        if self.options.dry_run {
            let destination = unique_path(&bucket_dir.join(file_name), true, |candidate| {
                candidate.exists() || planned.contains(candidate)
            })
            .ok_or_else(no_free_name)?;
            planned.insert(destination.clone());
            return Ok(TransferRecord::done(
                file_path,
                destination,
                TransferAction::Planned,
            ));
        }

        fs::create_dir_all(&bucket_dir).map_err(|e| TransferError::DirectoryCreationFailed {
            path: bucket_dir.clone(),
            source: e,
        })?;

        let destination =
            unique_destination_path(&bucket_dir.join(file_name)).ok_or_else(no_free_name)?;
        let mode = self.options.mode;
        let result = match mode {
            TransferMode::Move => move_file(file_path, &destination),
            TransferMode::Copy => copy_with_mtime(file_path, &destination).map(|_| ()),
        };
        result.map_err(|e| TransferError::TransferFailed {
            from: file_path.to_path_buf(),
            to: destination.clone(),
            verb: mode.verb(),
            source: e,
        })?;

        tracing::debug!(
            file = %file_path.display(),
            destination = %destination.display(),
            bytes = entry.size,
            %bucket,
            "transferred file"
        );
        let action = match mode {
            TransferMode::Move => TransferAction::Moved,
            TransferMode::Copy => TransferAction::Copied,
        };
        Ok(TransferRecord::done(file_path, destination, action))
    }
}

/// Checks that `root` exists and is a directory.
pub fn validate_root(root: &Path) -> OrganizeResult<()> {
    let metadata = fs::metadata(root).map_err(|e| OrganizeError::InvalidRoot {
        path: root.to_path_buf(),
        source: e,
    })?;
    if !metadata.is_dir() {
        return Err(OrganizeError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Collects the files to sort, ordered by path.
///
/// Without `recursive`, only regular files directly under `root` are
/// returned. With it, subdirectories are walked too, except bucket
/// directories from earlier runs and backup directories.
pub fn gather_files(root: &Path, recursive: bool) -> OrganizeResult<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| OrganizeError::ReadDirFailed {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    if recursive {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !is_pruned(root, entry));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "cannot read directory entry"),
            }
        }
    } else {
        for entry in entries {
            match entry {
                Ok(entry) => {
                    if let Ok(file_type) = entry.file_type()
                        && file_type.is_file()
                    {
                        files.push(entry.path());
                    }
                }
                Err(err) => tracing::warn!(error = %err, "cannot read directory entry"),
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_pruned(root: &Path, entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    bucket::is_bucket_dir(relative)
        || backup::is_backup_dir_name(&entry.file_name().to_string_lossy())
}

/// Lists the immediate subdirectories of `root`, sorted by path.
pub fn list_directories(root: &Path) -> OrganizeResult<Vec<PathBuf>> {
    validate_root(root)?;
    let entries = fs::read_dir(root).map_err(|e| OrganizeError::ReadDirFailed {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Returns true if `dir` (a subdirectory of `root`) contains at least one
/// `YYYY/MM` bucket directory.
pub fn holds_buckets(root: &Path, dir: &Path) -> bool {
    let Ok(relative) = dir.strip_prefix(root) else {
        return false;
    };
    fs::read_dir(dir).is_ok_and(|entries| {
        entries.flatten().any(|entry| {
            entry.file_type().is_ok_and(|t| t.is_dir())
                && bucket::is_bucket_dir(&relative.join(entry.file_name()))
        })
    })
}

/// Returns `dest` if it is free, otherwise the first free `stem (n).ext` next to it.
///
/// `report.pdf` becomes `report (1).pdf`, then `report (2).pdf`. Names
/// without an extension get the suffix at the end. Returns `None` only if
/// every suffix is taken.
pub fn unique_destination_path(dest: &Path) -> Option<PathBuf> {
    unique_path(dest, true, |candidate| candidate.exists())
}

/// Same numbering as [`unique_destination_path`] but without splitting off an
/// extension, for directory names such as backups.
pub(crate) fn unique_dir_path(dest: &Path) -> Option<PathBuf> {
    unique_path(dest, false, |candidate| candidate.exists())
}

fn unique_path(
    dest: &Path,
    split_extension: bool,
    is_taken: impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    if !is_taken(dest) {
        return Some(dest.to_path_buf());
    }

    let parent = dest.parent().unwrap_or_else(|| Path::new(""));
    let (stem, extension) = match (split_extension, dest.file_stem(), dest.extension()) {
        (true, Some(stem), Some(ext)) => (stem.to_os_string(), Some(ext.to_os_string())),
        _ => (dest.file_name()?.to_os_string(), None),
    };

    (1..=u32::MAX)
        .map(|n| {
            let mut name = stem.clone();
            name.push(format!(" ({})", n));
            if let Some(ext) = &extension {
                name.push(".");
                name.push(ext);
            }
            parent.join(name)
        })
        .find(|candidate| !is_taken(candidate))
}

/// Renames `from` to `to`, copying and removing across file systems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(file = %from.display(), "rename crosses devices, copying instead");
            copy_with_mtime(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

/// Copies a file and carries over its modification time.
///
/// Returns the number of bytes copied. Failing to set the time is logged,
/// not returned, since the contents are already in place.
pub(crate) fn copy_with_mtime(from: &Path, to: &Path) -> io::Result<u64> {
    let bytes = fs::copy(from, to)?;
    let preserved = fs::metadata(from)
        .and_then(|m| m.modified())
        .and_then(|modified| fs::File::options().write(true).open(to)?.set_modified(modified));
    if let Err(err) = preserved {
        tracing::warn!(file = %to.display(), error = %err, "could not preserve modification time");
    }
    Ok(bytes)
}
