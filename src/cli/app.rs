//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{dataset, outcome, skill, subject, topic};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "curriculum")]
#[command(author, version, about = "Local-first curriculum dataset manager")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new curriculum project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Load the raw dataset and make it the reset baseline
    ///
    /// Split files (subjects, topics, outcomes, skill-bits) are preferred;
    /// the combined document is used when they are missing or broken.
    Load {
        /// Dataset directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Replace the dataset with a combined-shape JSON document
    Import {
        /// Path to the document
        file: PathBuf,
    },

    /// Restore the last loaded dataset, or the seed data
    Reset,

    /// Show dataset counts and invariant checks
    Status,

    /// Search subjects, topics, outcomes and skill-bits
    Search {
        /// Search query
        query: String,
    },

    /// Manage subjects
    #[command(subcommand)]
    Subject(subject::SubjectCommands),

    /// Manage topics
    #[command(subcommand)]
    Topic(topic::TopicCommands),

    /// Manage learning outcomes
    #[command(subcommand)]
    Outcome(outcome::OutcomeCommands),

    /// Manage skill-bits
    #[command(subcommand)]
    Skill(skill::SkillCommands),
}

/// Logs go to stderr; `RUST_LOG` overrides the level chosen here
fn init_tracing(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve_format(flag: Option<OutputFormat>) -> OutputFormat {
    if let Some(format) = flag {
        return format;
    }

    match Config::load_global() {
        Ok(global) => global.default_format.into(),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Ignoring unreadable global config");
            OutputFormat::default()
        }
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = Output::new(resolve_format(cli.format));
    tracing::debug!("Curriculum CLI starting");

    match cli.command {
        Commands::Init { path } => {
            let project = Project::init(&path)?;
            tracing::debug!(dir = %project.project_dir().display(), "Created project directory");
            output.success(&format!(
                "Initialized curriculum project at {}",
                project.root().display()
            ));
        }

        Commands::Load { dir } => dataset::load(&output, dir)?,
        Commands::Import { file } => dataset::import(&output, &file)?,
        Commands::Reset => dataset::reset(&output)?,
        Commands::Status => dataset::status(&output)?,
        Commands::Search { query } => dataset::search(&output, &query)?,

        Commands::Subject(cmd) => subject::run(cmd, &output)?,
        Commands::Topic(cmd) => topic::run(cmd, &output)?,
        Commands::Outcome(cmd) => outcome::run(cmd, &output)?,
        Commands::Skill(cmd) => skill::run(cmd, &output)?,
    }

    tracing::debug!("Command completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn explicit_format_wins() {
        assert_eq!(resolve_format(Some(OutputFormat::Json)), OutputFormat::Json);
    }
}
