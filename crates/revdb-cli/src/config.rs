//! Configuration file handling
//!
//! Values resolve as command line (or environment) first, then the TOML
//! file, then built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use revdb_core::Limits;
use serde::Deserialize;

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// On-disk configuration, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub storage: StorageSection,
    pub log: LogSection,
    pub limits: LimitsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// SQLite database path; absent means in-memory only
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsSection {
    pub max_document_size: Option<usize>,
    pub max_nesting_depth: Option<usize>,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db: Option<PathBuf>,
    pub log_level: String,
    pub limits: Limits,
}

impl Settings {
    /// Merge command-line values over the file over defaults
    pub fn resolve(db: Option<PathBuf>, log_level: Option<String>, file: FileConfig) -> Self {
        let defaults = Limits::default();

        Self {
            db: db.or(file.storage.path),
            log_level: log_level
                .or(file.log.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            limits: Limits {
                max_document_size: file
                    .limits
                    .max_document_size
                    .unwrap_or(defaults.max_document_size),
                max_nesting_depth: file
                    .limits
                    .max_nesting_depth
                    .unwrap_or(defaults.max_nesting_depth),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(None, None, FileConfig::default());
        assert_eq!(settings.db, None);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.limits, Limits::default());
    }

    #[test]
    fn test_file_values() {
        let file = FileConfig::from_toml_str(
            r#"
            [storage]
            path = "/var/lib/revdb/data.db"

            [log]
            level = "debug"

            [limits]
            max_nesting_depth = 8
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(None, None, file);
        assert_eq!(settings.db, Some(PathBuf::from("/var/lib/revdb/data.db")));
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.limits.max_nesting_depth, 8);
        assert_eq!(settings.limits.max_document_size, Limits::default().max_document_size);
    }

    #[test]
    fn test_command_line_wins() {
        let file =
            FileConfig::from_toml_str("[log]\nlevel = \"debug\"\n[storage]\npath = \"a.db\"")
                .unwrap();
        let settings = Settings::resolve(Some("b.db".into()), Some("trace".into()), file);
        assert_eq!(settings.db, Some(PathBuf::from("b.db")));
        assert_eq!(settings.log_level, "trace");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(FileConfig::from_toml_str("[storage]\nurl = \"x\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revdb.toml");
        std::fs::write(&path, "[limits]\nmax_document_size = 1024\n").unwrap();

        let file = FileConfig::from_toml_file(&path).unwrap();
        assert_eq!(file.limits.max_document_size, Some(1024));
        assert!(FileConfig::from_toml_file(&dir.path().join("missing.toml")).is_err());
    }
}
