//! Application state remembered between runs.
//!
//! Holds the last directory that was sorted so the CLI can default to it.
//! The binary loads and saves this explicitly; the sorting code never reads it.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write state file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid state file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub last_directory: Option<PathBuf>,
    #[serde(default)]
    pub last_run: Option<DateTime<Local>>,
}

impl AppState {
    /// `~/.config/folderchronicle/state.json`, if `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("folderchronicle")
                .join("state.json")
        })
    }

    /// Loads state from `path`. A missing file yields the default state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path).map_err(|e| StateError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| StateError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes state to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let write_error = |e: io::Error| StateError::Write {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(path, json).map_err(write_error)
    }

    /// Records `directory` as the last one sorted, stamped with the current time.
    pub fn remember(&mut self, directory: &Path) {
        self.last_directory = Some(directory.to_path_buf());
        self.last_run = Some(Local::now());
    }
}
