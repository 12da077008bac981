//! Run defaults, backup placement, and file filtering configuration.
//!
//! Configuration is loaded from a TOML file. Every section is optional:
//!
//! ```toml
//! [organize]
//! mode = "move"            # or "copy"
//! timestamp = "modified"   # or "created"
//! recursive = false
//! backup = true            # defaults to true for move, false for copy
//!
//! [backup]
//! directory = "/mnt/backups"
//!
//! [filters]
//! include_hidden = true
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.part", "cache/**"]
//! extensions = ["tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! Filter patterns are matched against the file path relative to the
//! organized directory.

use crate::bucket::TimestampSource;
use crate::file_organizer::{OrganizeOptions, TransferMode};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".folderchroniclerc.toml";

/// Errors that can occur during configuration loading and filter compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub organize: OrganizeSettings,
    #[serde(default)]
    pub backup: BackupSettings,
    #[serde(default)]
    pub filters: FilterRules,
}

/// Defaults for a sort run. Command-line flags override these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizeSettings {
    #[serde(default)]
    pub mode: TransferMode,
    #[serde(default)]
    pub timestamp: TimestampSource,
    #[serde(default)]
    pub recursive: bool,
    /// Explicit backup choice. `None` means "back up when moving".
    #[serde(default)]
    pub backup: Option<bool>,
}

/// Where backups are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Parent directory for backups. Defaults to the organized directory's parent.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether hidden files (starting with ".") are sorted. Defaults to true.
    #[serde(default = "default_include_hidden")]
    pub include_hidden: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_include_hidden() -> bool {
    true
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            include_hidden: default_include_hidden(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from sorting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.part", "cache/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude, case-insensitive (e.g., "tmp").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.folderchroniclerc.toml` in the current directory
    /// 3. Look for `~/.config/folderchronicle/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("folderchronicle")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Builds run options from the configured defaults.
    pub fn organize_options(&self) -> OrganizeOptions {
        let settings = &self.organize;
        OrganizeOptions {
            mode: settings.mode,
            timestamp_source: settings.timestamp,
            recursive: settings.recursive,
            backup: settings
                .backup
                .unwrap_or_else(|| settings.mode.backs_up_by_default()),
            dry_run: false,
            backup_settings: self.backup.clone(),
        }
    }

    /// Compile the filter rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Why a file was left out of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Hidden,
    Filename,
    Extension(String),
    Pattern(String),
    Regex(String),
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Hidden => write!(f, "hidden file"),
            Exclusion::Filename => write!(f, "excluded file name"),
            Exclusion::Extension(ext) => write!(f, "excluded extension '{}'", ext),
            Exclusion::Pattern(pattern) => write!(f, "matches exclude pattern '{}'", pattern),
            Exclusion::Regex(regex) => write!(f, "matches exclude regex '{}'", regex),
        }
    }
}

/// Compiled filter structures for file matching.
///
/// Glob and regex patterns are parsed once here rather than for every file.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    include_hidden: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl Default for CompiledFilters {
    /// Filters that let every file through.
    fn default() -> Self {
        Self {
            include_hidden: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

impl CompiledFilters {
    /// Create compiled filters from filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_hidden: rules.include_hidden,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file should be sorted (not excluded).
    pub fn should_include(&self, file_path: &Path) -> bool {
        self.exclusion(file_path).is_none()
    }

    /// Returns the first rule that excludes `file_path`, if any.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter
    /// 3. Exact filename match
    /// 4. File extension match
    /// 5. Glob pattern match
    /// 6. Regex pattern match against the file name
    pub fn exclusion(&self, file_path: &Path) -> Option<Exclusion> {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return None;
        }

        if !self.include_hidden && file_name.starts_with('.') {
            return Some(Exclusion::Hidden);
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return Some(Exclusion::Filename);
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return Some(Exclusion::Extension(ext_lower));
            }
        }

        if let Some(pattern) = self
            .exclude_patterns
            .iter()
            .find(|pattern| pattern.matches_path(file_path))
        {
            return Some(Exclusion::Pattern(pattern.as_str().to_string()));
        }

        self.exclude_regexes
            .iter()
            .find(|regex| regex.is_match(&file_name))
            .map(|regex| Exclusion::Regex(regex.as_str().to_string()))
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules_with_exclude(exclude: ExcludeRules) -> FilterRules {
        FilterRules {
            include_hidden: true,
            exclude,
            include: IncludeRules::default(),
        }
    }

    #[test]
    fn test_default_config_includes_hidden_files() {
        let config = AppConfig::default();
        assert!(config.filters.include_hidden);

        let compiled = config.compile_filters().unwrap();
        assert!(compiled.should_include(Path::new(".DS_Store")));
    }

    #[test]
    fn test_default_options_move_with_backup() {
        let options = AppConfig::default().organize_options();
        assert_eq!(options.mode, TransferMode::Move);
        assert_eq!(options.timestamp_source, TimestampSource::Modified);
        assert!(options.backup);
        assert!(!options.recursive);
        assert!(!options.dry_run);
    }

    #[test]
    fn test_copy_mode_disables_backup_by_default() {
        let config = AppConfig::from_toml("[organize]\nmode = \"copy\"\n").unwrap();
        assert_eq!(config.organize.mode, TransferMode::Copy);
        assert!(!config.organize_options().backup);
    }

    #[test]
    fn test_explicit_backup_overrides_mode_default() {
        let config =
            AppConfig::from_toml("[organize]\nmode = \"copy\"\nbackup = true\n").unwrap();
        assert!(config.organize_options().backup);

        let config = AppConfig::from_toml("[organize]\nbackup = false\n").unwrap();
        assert!(!config.organize_options().backup);
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_toml(
            r#"
            [organize]
            timestamp = "created"
            recursive = true

            [backup]
            directory = "/srv/backups"

            [filters]
            include_hidden = false

            [filters.exclude]
            extensions = ["part"]
            "#,
        )
        .unwrap();

        assert_eq!(config.organize.timestamp, TimestampSource::Created);
        assert!(config.organize.recursive);
        assert_eq!(
            config.backup.directory.as_deref(),
            Some(Path::new("/srv/backups"))
        );
        assert!(!config.filters.include_hidden);
        assert_eq!(config.filters.exclude.extensions, vec!["part".to_string()]);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = AppConfig::from_toml("[organize]\nmode = \"shuffle\"\n");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[organize]\nmode = \"copy\"\n").expect("Failed to write config");

        let config = AppConfig::load(Some(&path)).expect("Failed to load config");
        assert_eq!(config.organize.mode, TransferMode::Copy);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("missing.toml");

        let result = AppConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_hidden_file_excluded_when_disabled() {
        let rules = FilterRules {
            include_hidden: false,
            ..Default::default()
        };
        let compiled = CompiledFilters::new(&rules).unwrap();

        assert_eq!(
            compiled.exclusion(Path::new(".gitignore")),
            Some(Exclusion::Hidden)
        );
        assert!(compiled.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            filenames: vec!["Thumbs.db".to_string(), ".DS_Store".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(compiled.should_include(Path::new("image.jpg")));
    }

    #[test]
    fn test_exclude_extensions() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            extensions: vec!["bak".to_string(), ".tmp".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("file.bak")));
        assert!(!compiled.should_include(Path::new("file.tmp")));
        assert_eq!(
            compiled.exclusion(Path::new("file.BAK")),
            Some(Exclusion::Extension("bak".to_string()))
        );
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_exclude_glob_patterns() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            patterns: vec!["*.cache".to_string(), "**/logs/**".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("file.cache")));
        assert!(!compiled.should_include(Path::new("app/logs/file.txt")));
        assert!(compiled.should_include(Path::new("my_logs/file.txt")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let rules = FilterRules {
            include_hidden: false,
            exclude: ExcludeRules {
                extensions: vec!["log".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec![".important".to_string(), "keep.log".to_string()],
            },
        };
        let compiled = CompiledFilters::new(&rules).unwrap();

        assert!(compiled.should_include(Path::new(".important")));
        assert!(compiled.should_include(Path::new("keep.log")));
        assert!(!compiled.should_include(Path::new(".other")));
        assert!(!compiled.should_include(Path::new("drop.log")));
    }

    #[test]
    fn test_exclude_regex() {
        let compiled = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            regex: vec![r"^~\$.*".to_string()],
            ..Default::default()
        }))
        .unwrap();

        assert!(!compiled.should_include(Path::new("~$report.docx")));
        assert!(compiled.should_include(Path::new("report.docx")));
    }

    #[test]
    fn test_invalid_regex_returns_error() {
        let result = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            regex: vec!["[invalid(".to_string()],
            ..Default::default()
        }));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_glob_pattern_returns_error() {
        let result = CompiledFilters::new(&rules_with_exclude(ExcludeRules {
            patterns: vec!["[invalid".to_string()],
            ..Default::default()
        }));
        assert!(matches!(result, Err(ConfigError::InvalidGlobPattern(_))));
    }
}
