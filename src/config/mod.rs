// ABOUTME: Configuration management for branchwork
// Handles backend tool settings, default project layout and logging preferences

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::project::{DEFAULT_RELEASE_PATH, DEFAULT_TRUNK_PATH, DEFAULT_USER_PATH};
use crate::models::ProjectLayout;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Version-control client settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Layout used by `bw init` when no paths are given
    #[serde(default)]
    pub project_defaults: ProjectDefaults,

    /// Log filter and destination
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// svn client binary (name on PATH or absolute path)
    #[serde(default = "default_svn")]
    pub svn: String,

    /// svnmucc binary used for multi-operation server-side commits
    #[serde(default = "default_svnmucc")]
    pub svnmucc: String,

    /// Pass --non-interactive to every client invocation
    #[serde(default = "default_true")]
    pub non_interactive: bool,

    /// Username forwarded to the client
    #[serde(default)]
    pub username: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            svn: default_svn(),
            svnmucc: default_svnmucc(),
            non_interactive: default_true(),
            username: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectDefaults {
    #[serde(default = "default_trunk_path")]
    pub trunk_path: String,

    #[serde(default = "default_release_path")]
    pub release_branches_path: String,

    #[serde(default = "default_user_path")]
    pub user_branches_path: String,
}

impl Default for ProjectDefaults {
    fn default() -> Self {
        Self {
            trunk_path: default_trunk_path(),
            release_branches_path: default_release_path(),
            user_branches_path: default_user_path(),
        }
    }
}

impl ProjectDefaults {
    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(
            &self.trunk_path,
            &self.release_branches_path,
            &self.user_branches_path,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Log directory (default: ~/.branchwork/logs)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            directory: None,
        }
    }
}

fn default_svn() -> String {
    "svn".to_string()
}

fn default_svnmucc() -> String {
    "svnmucc".to_string()
}

fn default_true() -> bool {
    true
}

fn default_trunk_path() -> String {
    DEFAULT_TRUNK_PATH.to_string()
}

fn default_release_path() -> String {
    DEFAULT_RELEASE_PATH.to_string()
}

fn default_user_path() -> String {
    DEFAULT_USER_PATH.to_string()
}

fn default_filter() -> String {
    "branchwork=info".to_string()
}

impl AppConfig {
    /// Load configuration from default locations
    pub fn load(working_dir: &Path) -> Result<Self> {
        Self::load_from(&Self::get_config_paths(working_dir))
    }

    /// Load and merge the given files, lowest precedence first; absent files are skipped
    pub fn load_from(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Self::default();

        for path in paths {
            if path.exists() {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;

                let file_config: AppConfig = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config from {}", path.display()))?;

                config.merge(file_config);
            }
        }

        Ok(config)
    }

    /// Configuration file paths, lowest precedence first
    fn get_config_paths(working_dir: &Path) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/branchwork/config.toml")];

        if let Ok(config_dir) = Self::get_user_config_dir() {
            paths.push(config_dir.join("config.toml"));
        }

        paths.push(working_dir.join(".branchwork").join("config.toml"));

        paths
    }

    /// User configuration directory (~/.branchwork)
    pub fn get_user_config_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home_dir.join(".branchwork"))
    }

    /// Directory for JSONL log files
    pub fn log_dir(&self) -> Result<PathBuf> {
        match &self.logging.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::get_user_config_dir()?.join("logs")),
        }
    }

    /// Merge another config into this one; fields left at their defaults don't override
    fn merge(&mut self, other: AppConfig) {
        if other.backend.svn != default_svn() {
            self.backend.svn = other.backend.svn;
        }
        if other.backend.svnmucc != default_svnmucc() {
            self.backend.svnmucc = other.backend.svnmucc;
        }
        if other.backend.non_interactive != default_true() {
            self.backend.non_interactive = other.backend.non_interactive;
        }
        if other.backend.username.is_some() {
            self.backend.username = other.backend.username;
        }

        if other.project_defaults.trunk_path != default_trunk_path() {
            self.project_defaults.trunk_path = other.project_defaults.trunk_path;
        }
        if other.project_defaults.release_branches_path != default_release_path() {
            self.project_defaults.release_branches_path =
                other.project_defaults.release_branches_path;
        }
        if other.project_defaults.user_branches_path != default_user_path() {
            self.project_defaults.user_branches_path = other.project_defaults.user_branches_path;
        }

        if other.logging.filter != default_filter() {
            self.logging.filter = other.logging.filter;
        }
        if other.logging.directory.is_some() {
            self.logging.directory = other.logging.directory;
        }
    }
}
