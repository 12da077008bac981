//! Full copy of a directory tree, taken before files are moved.
//!
//! The backup lands next to the organized directory as
//! `<name>_backup_<YYYY-MM-DD_HH-MM-SS>`, or under the configured backup
//! directory. Any failure aborts the backup, removes what was written so
//! far, and is reported as [`OrganizeError::BackupFailed`].

use crate::config::BackupSettings;
use crate::file_organizer::{self, OrganizeError, OrganizeResult};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

const BACKUP_INFIX: &str = "_backup_";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

static BACKUP_DIR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.+_backup_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}( \(\d+\))?$")
        .expect("backup name pattern is valid")
});

/// Returns true if `name` is a directory name produced by [`BackupManager`].
pub fn is_backup_dir_name(name: &str) -> bool {
    BACKUP_DIR_NAME.is_match(name)
}

/// Result of a completed backup.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub path: PathBuf,
    pub files_copied: usize,
    pub bytes_copied: u64,
}

/// Takes backups of directories before they are sorted.
pub struct BackupManager;

impl BackupManager {
    /// Copies the whole tree under `root` to a new timestamped directory.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizeError::InvalidRoot`] or [`OrganizeError::NotADirectory`]
    /// for a bad `root`, and [`OrganizeError::BackupFailed`] if the target cannot
    /// be created or any entry cannot be copied. `root` is never modified.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use folderchronicle::backup::BackupManager;
    /// use folderchronicle::config::BackupSettings;
    /// use std::path::Path;
    ///
    /// match BackupManager::backup(Path::new("/home/user/Downloads"), &BackupSettings::default()) {
    ///     Ok(report) => println!("Backed up {} files to {}", report.files_copied, report.path.display()),
    ///     Err(e) => eprintln!("Backup failed: {}", e),
    /// }
    /// ```
    pub fn backup(root: &Path, settings: &BackupSettings) -> OrganizeResult<BackupReport> {
        file_organizer::validate_root(root)?;
        let root = fs::canonicalize(root).map_err(|e| OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            source: e,
        })?;

        let target = Self::backup_path(&root, settings, Local::now())?;
        tracing::info!(root = %root.display(), backup = %target.display(), "creating backup");

        match Self::copy_tree(&root, &target) {
            Ok(report) => {
                tracing::info!(
                    backup = %report.path.display(),
                    files = report.files_copied,
                    bytes = report.bytes_copied,
                    "backup complete"
                );
                Ok(report)
            }
            Err(source) => {
                if target.exists()
                    && let Err(e) = fs::remove_dir_all(&target)
                {
                    tracing::warn!(
                        backup = %target.display(),
                        error = %e,
                        "could not remove incomplete backup"
                    );
                }
                Err(OrganizeError::BackupFailed {
                    path: target,
                    source,
                })
            }
        }
    }

    /// Computes a free backup directory path for `root` at time `now`.
    ///
    /// Example: `/home/user/Downloads` becomes
    /// `/home/user/Downloads_backup_2024-05-01_09-30-00`, or
    /// `... (1)` if that already exists.
    pub fn backup_path(
        root: &Path,
        settings: &BackupSettings,
        now: DateTime<Local>,
    ) -> OrganizeResult<PathBuf> {
        let failed = |reason: &str, path: PathBuf| OrganizeError::BackupFailed {
            path,
            source: io::Error::new(io::ErrorKind::InvalidInput, reason.to_string()),
        };

        let parent = match (&settings.directory, root.parent()) {
            (Some(directory), _) => directory.clone(),
            (None, Some(parent)) => parent.to_path_buf(),
            (None, None) => {
                return Err(failed(
                    "directory has no parent to place a backup in",
                    root.to_path_buf(),
                ));
            }
        };
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "folder".to_string());

        let candidate = parent.join(format!(
            "{}{}{}",
            root_name,
            BACKUP_INFIX,
            now.format(TIMESTAMP_FORMAT)
        ));
        file_organizer::unique_dir_path(&candidate)
            .ok_or_else(|| failed("no free backup directory name", candidate))
    }

    fn copy_tree(root: &Path, target: &Path) -> io::Result<BackupReport> {
        fs::create_dir_all(target)?;
        let target = fs::canonicalize(target)?;

        let mut report = BackupReport {
            path: target.clone(),
            files_copied: 0,
            bytes_copied: 0,
        };

        // The target may sit inside root when a backup directory is configured there.
        let walker = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !entry.path().starts_with(&target));

        for entry in walker {
            let entry = entry?;
            let relative = entry.path().strip_prefix(root).map_err(io::Error::other)?;
            let destination = target.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&destination)?;
            } else if file_type.is_symlink() && !entry.path().is_file() {
                tracing::warn!(path = %entry.path().display(), "skipping link that is not a file");
            } else {
                report.bytes_copied += file_organizer::copy_with_mtime(entry.path(), &destination)?;
                report.files_copied += 1;
            }
        }

        Ok(report)
    }
}
