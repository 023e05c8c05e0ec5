//! Configuration handling
//!
//! Configuration is stored in `.curriculum/config.toml` (project) and in the
//! platform config directory, e.g. `~/.config/curriculum-cli/config.toml`
//! (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::source::DatasetFiles;

/// Name of the per-project directory
pub const PROJECT_DIR: &str = ".curriculum";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config {path}: {message}")]
    Parse { path: String, message: String },
}

/// Reads a TOML config file; a missing file yields the defaults
fn read_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    toml::from_str(&content).map_err(|e| {
        ConfigError::Parse {
            path: path.display().to_string(),
            message: e.message().to_string(),
        }
        .into()
    })
}

/// Where the raw dataset lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Directory holding the dataset files, relative to the project root
    pub dir: PathBuf,

    #[serde(flatten)]
    pub files: DatasetFiles,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            files: DatasetFiles::default(),
        }
    }
}

/// Where the snapshot is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file name inside `.curriculum/`
    pub snapshot_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_file: "snapshot.json".to_string(),
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub dataset: DatasetConfig,
    pub store: StoreConfig,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Global settings plus the settings of one project
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
}

impl Config {
    /// Loads a project's config; a broken global config only warns
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let project = read_toml(&project_root.join(PROJECT_DIR).join("config.toml"))?;
        let global = Self::load_global().unwrap_or_else(|e| {
            warn!(error = %format!("{:#}", e), "Ignoring unreadable global config");
            GlobalConfig::default()
        });

        Ok(Self { project, global })
    }

    /// Platform config directory, e.g. `~/.config/curriculum-cli`
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "curriculum", "curriculum-cli")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn load_global() -> Result<GlobalConfig> {
        match Self::global_config_dir() {
            Some(dir) => read_toml(&dir.join("config.toml")),
            None => Ok(GlobalConfig::default()),
        }
    }

    /// Walks up from the current directory to the first one holding `.curriculum/`
    pub fn find_project_root() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        cwd.ancestors()
            .find(|dir| dir.join(PROJECT_DIR).is_dir())
            .map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = ProjectConfig::default();

        assert_eq!(config.dataset.dir, PathBuf::from("data"));
        assert_eq!(config.dataset.files.combined_file, "curriculum.json");
        assert_eq!(config.store.snapshot_file, "snapshot.json");
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[dataset]
dir = "curriculum-data"
combined_file = "all.json"

[store]
snapshot_file = "state.json"
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.dataset.dir, PathBuf::from("curriculum-data"));
        assert_eq!(config.dataset.files.combined_file, "all.json");
        assert_eq!(config.dataset.files.subjects_file, "subjects.json");
        assert_eq!(config.store.snapshot_file, "state.json");
    }

    #[test]
    fn parse_global_config() {
        let config: GlobalConfig = toml::from_str(r#"default_format = "json""#).unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn project_config_from_disk() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(PROJECT_DIR);
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join("config.toml"), "[dataset]\ndir = \"raw\"\n").unwrap();

        let config = Config::for_project(dir.path()).unwrap();
        assert_eq!(config.project.dataset.dir, PathBuf::from("raw"));
        assert_eq!(config.project.store, StoreConfig::default());
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config: ProjectConfig = read_toml(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn invalid_config_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[dataset\n").unwrap();

        let err = read_toml::<ProjectConfig>(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
