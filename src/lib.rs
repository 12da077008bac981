//! folderchronicle - sort a directory's files into Year/Month folders
//!
//! This library gathers the files of a directory, buckets them by timestamp,
//! and moves or copies them into `YYYY/MM` subdirectories. Name collisions get a
//! numeric suffix, and per-file failures are recorded without stopping the run.
//! A full backup of the directory can be taken first.

pub mod backup;
pub mod bucket;
pub mod cli;
pub mod config;
pub mod file_organizer;
pub mod output;
pub mod state;

pub use backup::{BackupManager, BackupReport};
pub use bucket::{Bucket, TimestampSource};
pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use file_organizer::{
    FileOrganizer, OrganizeError, OrganizeOptions, RunReport, TransferAction, TransferMode,
    TransferRecord,
};
pub use state::AppState;

pub use cli::{OrganizeCommand, run_cli};
