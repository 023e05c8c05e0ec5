//! Dataset sources
//!
//! A [`DatasetSource`] fetches named JSON documents. [`load_raw`] applies the
//! loading policy on top of it: the three required split files are preferred;
//! if any is missing or unparsable the combined document is used instead. A
//! missing or broken skill-bits file only degrades to an empty set.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ingest::raw::{SplitOutcome, SplitSkillBit, SplitSubject, SplitTopic};
use crate::ingest::{CombinedInput, RawDataset, SplitInput};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No dataset found in {0}: neither split files nor a combined document")]
    NotFound(String),

    #[error("Failed to parse {file}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to fetch {file}: {message}")]
    Fetch { file: String, message: String },
}

/// Fetches raw JSON documents by name
pub trait DatasetSource: Send + Sync {
    /// Returns `Ok(None)` when the document does not exist
    fn fetch(&self, name: &str) -> Result<Option<String>>;

    /// Human-readable location, for messages
    fn describe(&self) -> String;
}

/// Reads documents from a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DatasetSource for DirectorySource {
    fn fetch(&self, name: &str) -> Result<Option<String>> {
        let path = self.root.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// File names of the split and combined documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFiles {
    pub subjects_file: String,
    pub topics_file: String,
    pub outcomes_file: String,
    pub skill_bits_file: String,
    pub combined_file: String,
}

impl Default for DatasetFiles {
    fn default() -> Self {
        Self {
            subjects_file: "subjects.json".to_string(),
            topics_file: "topics.json".to_string(),
            outcomes_file: "learning_outcomes.json".to_string(),
            skill_bits_file: "skill_bits.json".to_string(),
            combined_file: "curriculum.json".to_string(),
        }
    }
}

fn fetch_json<T: DeserializeOwned>(
    source: &dyn DatasetSource,
    name: &str,
) -> Result<Option<T>, LoadError> {
    let Some(content) = source.fetch(name).map_err(|e| LoadError::Fetch {
        file: name.to_string(),
        message: format!("{:#}", e),
    })?
    else {
        return Ok(None);
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| LoadError::Parse {
            file: name.to_string(),
            source,
        })
}

fn load_split(source: &dyn DatasetSource, files: &DatasetFiles) -> Result<Option<SplitInput>, LoadError> {
    let Some(subjects) = fetch_json::<Vec<SplitSubject>>(source, &files.subjects_file)? else {
        return Ok(None);
    };
    let Some(topics) = fetch_json::<Vec<SplitTopic>>(source, &files.topics_file)? else {
        return Ok(None);
    };
    let Some(outcomes) = fetch_json::<Vec<SplitOutcome>>(source, &files.outcomes_file)? else {
        return Ok(None);
    };

    let skill_bits = match fetch_json::<Vec<SplitSkillBit>>(source, &files.skill_bits_file) {
        Ok(Some(bits)) => bits,
        Ok(None) => {
            debug!(file = %files.skill_bits_file, "No skill-bits file; using an empty set");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable skill-bits file");
            Vec::new()
        }
    };

    Ok(Some(SplitInput {
        subjects,
        topics,
        outcomes,
        skill_bits,
    }))
}

/// Fetches raw data, preferring the split shape
pub fn load_raw(source: &dyn DatasetSource, files: &DatasetFiles) -> Result<RawDataset, LoadError> {
    match load_split(source, files) {
        Ok(Some(split)) => {
            info!(source = %source.describe(), "Loaded split dataset");
            return Ok(RawDataset::Split(split));
        }
        Ok(None) => debug!("Split files incomplete; trying combined document"),
        Err(e) => warn!(error = %e, "Split files unusable; trying combined document"),
    }

    match fetch_json::<CombinedInput>(source, &files.combined_file)? {
        Some(combined) => {
            info!(source = %source.describe(), "Loaded combined dataset");
            Ok(RawDataset::Combined(combined))
        }
        None => Err(LoadError::NotFound(source.describe())),
    }
}
