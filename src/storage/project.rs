//! Project management
//!
//! Handles project initialization and provides access to the dataset
//! loader, the snapshot and the search index.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::PROJECT_DIR;
use super::{Config, DatasetLoader, DirectorySource, FileSnapshotStore, SearchIndex};
use crate::domain::Dataset;
use crate::store::CurriculumStore;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a curriculum project. Run 'curriculum init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# Curriculum CLI configuration

[dataset]
# Directory holding the raw dataset, relative to the project root
dir = "data"

# Split files are preferred; the combined document is the fallback
# subjects_file = "subjects.json"
# topics_file = "topics.json"
# outcomes_file = "learning_outcomes.json"
# skill_bits_file = "skill_bits.json"
# combined_file = "curriculum.json"

[store]
snapshot_file = "snapshot.json"
"#;

const DEFAULT_GITIGNORE: &str = r#"# Ignore the search index (rebuilt from the snapshot)
.cache/
"#;

/// A curriculum project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(PROJECT_DIR).is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a project at the given path; existing files are kept
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let project_dir = root.join(PROJECT_DIR);

        fs::create_dir_all(&project_dir).with_context(|| {
            format!("Failed to create {} directory: {}", PROJECT_DIR, project_dir.display())
        })?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = project_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, DEFAULT_GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .curriculum directory path
    pub fn project_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory the raw dataset is read from
    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.dataset.dir)
    }

    /// Returns a loader for the configured dataset directory
    pub fn dataset_loader(&self) -> DatasetLoader<DirectorySource> {
        DatasetLoader::new(
            DirectorySource::new(self.dataset_dir()),
            self.config.project.dataset.files.clone(),
        )
    }

    pub fn snapshot_store(&self) -> FileSnapshotStore {
        FileSnapshotStore::new(self.project_dir().join(&self.config.project.store.snapshot_file))
    }

    /// Opens the mutation store on the project's snapshot
    pub fn open_store(&self) -> CurriculumStore {
        CurriculumStore::open(self.snapshot_store())
    }

    /// Returns the cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.project_dir().join(".cache")
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_dir().join("index.db")
    }

    /// Opens the search index for this project
    pub fn search_index(&self) -> Result<SearchIndex> {
        let path = self.index_path();
        SearchIndex::open(&path)
            .with_context(|| format!("Failed to open search index: {}", path.display()))
    }

    /// Gets the index if it matches `dataset`, or rebuilds it if stale
    pub fn get_or_rebuild_index(&self, dataset: &Dataset) -> Result<SearchIndex> {
        let mut index = self.search_index()?;

        if index.is_stale(dataset)? {
            index.rebuild(dataset).context("Failed to rebuild search index")?;
        }

        Ok(index)
    }

    /// Returns a relative path from the project root
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(|p| p.to_path_buf())
    }
}
