//! Whole-dataset commands: load, import, reset, status and search

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::output::Output;
use crate::ingest::CombinedInput;
use crate::storage::{DatasetLoader, DirectorySource, Project};

pub fn load(output: &Output, dir: Option<PathBuf>) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let loader = match dir {
        Some(dir) => DatasetLoader::new(
            DirectorySource::new(dir),
            project.config().project.dataset.files.clone(),
        ),
        None => project.dataset_loader(),
    };
    tracing::debug!(dir = %loader.source().root().display(), "Loading dataset");

    let report = store
        .load_from(&loader)
        .with_context(|| format!("Failed to load dataset from {}", loader.source().root().display()))?;

    output.ingest_report(&report, "Loaded dataset");
    Ok(())
}

pub fn import(output: &Output, file: &Path) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let input = CombinedInput::from_json(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let report = store.import_combined(&input);
    output.ingest_report(&report, "Imported dataset");
    Ok(())
}

pub fn reset(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let target = if store.baseline().is_some() {
        "last loaded dataset"
    } else {
        "seed data"
    };
    store.reset();

    output.success(&format!("Reset to {}", target));
    Ok(())
}

pub fn status(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();
    let dataset = store.dataset();

    let counts = dataset.counts();
    let violations = dataset.violations();
    let snapshot = project.snapshot_store();

    if output.is_json() {
        output.data(&serde_json::json!({
            "counts": counts,
            "has_baseline": store.baseline().is_some(),
            "snapshot": snapshot.path().display().to_string(),
            "violations": violations.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
        }));
    } else {
        println!("Dataset Status");
        println!("{}", "=".repeat(40));
        println!();
        println!("Subjects:           {}", counts.subjects);
        println!("Topics:             {}", counts.topics);
        println!("Learning outcomes:  {}", counts.learning_outcomes);
        println!("Skill-bits:         {}", counts.skill_bits);
        println!();
        println!(
            "Reset baseline: {}",
            if store.baseline().is_some() {
                "last loaded dataset"
            } else {
                "seed data"
            }
        );
        if let Some(path) = project.relative_path(snapshot.path()) {
            println!("Snapshot: {}", path.display());
        }

        println!();
        if violations.is_empty() {
            println!("Invariants: ok");
        } else {
            println!("Invariants: {} violation(s)", violations.len());
            for violation in &violations {
                println!("  - {}", violation);
            }
        }
    }

    Ok(())
}

/// Full-text search through the SQLite index
pub fn search(output: &Output, query: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();
    tracing::debug!(query, "Searching");

    let index = project.get_or_rebuild_index(store.dataset())?;
    let hits = index.search(query)?;
    tracing::debug!(hits = hits.len(), "Search finished");

    if output.is_json() {
        output.data(&hits);
    } else if hits.is_empty() {
        println!("No results found for '{}'", query);
    } else {
        println!("Search results for '{}':", query);
        println!("{:<18} {:<40} TITLE", "TYPE", "ID");
        println!("{}", "-".repeat(80));

        for hit in &hits {
            println!("{:<18} {:<40} {}", hit.kind.label(), hit.id, hit.title);
            if !hit.snippet.is_empty() && hit.snippet != hit.title {
                println!("{:19}{}", "", hit.snippet);
            }
        }

        println!();
        println!("Found {} result(s)", hits.len());
    }

    Ok(())
}
