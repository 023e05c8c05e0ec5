//! Subject CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::domain::{EntityId, PublicationStatus};
use crate::storage::Project;
use crate::store::{NewSubject, SubjectPatch};

#[derive(Subcommand)]
pub enum SubjectCommands {
    /// List subjects
    List,

    /// Show subject details
    Show {
        /// Subject ID
        id: String,
    },

    /// Add a subject
    Add {
        /// Subject title
        title: String,

        /// Explicit ID (derived from the title otherwise)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Canonical URI
        #[arg(long)]
        uri: Option<String>,

        /// draft or published
        #[arg(long, default_value = "draft")]
        status: PublicationStatus,
    },

    /// Edit a subject; pass an empty string to clear an optional field
    Edit {
        /// Subject ID
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        uri: Option<String>,

        #[arg(long)]
        status: Option<PublicationStatus>,
    },

    /// Remove a subject with all its topics, outcomes and skill-bits
    Rm {
        /// Subject ID
        id: String,
    },
}

pub fn run(cmd: SubjectCommands, output: &Output) -> Result<()> {
    match cmd {
        SubjectCommands::List => list_subjects(output),
        SubjectCommands::Show { id } => show_subject(output, &id),
        SubjectCommands::Add {
            title,
            id,
            description,
            uri,
            status,
        } => {
            let input = NewSubject {
                id: id.map(|id| id.parse::<EntityId>()).transpose()?,
                title,
                description,
                uri,
                status,
            };
            add_subject(output, input)
        }
        SubjectCommands::Edit {
            id,
            title,
            description,
            uri,
            status,
        } => {
            let patch = SubjectPatch {
                title,
                description: description.map(Some),
                uri: uri.map(Some),
                status,
            };
            edit_subject(output, &id, patch)
        }
        SubjectCommands::Rm { id } => remove_subject(output, &id),
    }
}

fn list_subjects(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();
    let subjects = store.subjects();

    if output.is_json() {
        output.data(&subjects);
    } else if subjects.is_empty() {
        println!("No subjects");
    } else {
        println!("{:<28} {:<10} {:>6} TITLE", "ID", "STATUS", "TOPICS");
        println!("{}", "-".repeat(70));

        for subject in subjects {
            let topics = store.dataset().topics_for_subject(&subject.id).count();
            println!("{:<28} {:<10} {:>6} {}", subject.id, subject.status, topics, subject.title);
        }
    }

    Ok(())
}

fn show_subject(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let subject = store.subject(&id)?;
    let roots: Vec<_> = store
        .topic_tree(&id)?
        .iter()
        .map(|node| (node.topic, node.size()))
        .collect();

    if output.is_json() {
        output.data(&serde_json::json!({
            "subject": subject,
            "root_topics": roots.iter().map(|(t, _)| t.id.to_string()).collect::<Vec<_>>(),
        }));
    } else {
        println!("Subject: {}", subject.id);
        println!("Title: {}", subject.title);
        println!("Status: {}", subject.status);
        if let Some(uri) = &subject.uri {
            println!("URI: {}", uri);
        }
        println!("Created: {}", subject.created_at.format("%Y-%m-%d %H:%M"));
        println!("Updated: {}", subject.updated_at.format("%Y-%m-%d %H:%M"));

        if let Some(desc) = &subject.description {
            println!("\nDescription:");
            println!("{}", desc);
        }

        if !roots.is_empty() {
            println!("\nTopics:");
            for (topic, size) in &roots {
                println!("  {} - {} ({} topic(s))", topic.id, topic.name, size);
            }
        }
    }

    Ok(())
}

fn add_subject(output: &Output, input: NewSubject) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let subject = store.create_subject(input)?;

    if output.is_json() {
        output.data(&subject);
    } else {
        println!("Created subject: {} - {}", subject.id, subject.title);
    }

    Ok(())
}

fn edit_subject(output: &Output, id_str: &str, patch: SubjectPatch) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let subject = store.update_subject(&id, patch)?;

    if output.is_json() {
        output.data(&subject);
    } else {
        println!("Updated subject: {}", subject.id);
    }

    Ok(())
}

fn remove_subject(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let removal = store.delete_subject(&id)?;

    if output.is_json() {
        output.data(&removal);
    } else {
        println!(
            "Removed subject {} ({} topic(s), {} outcome(s), {} skill-bit(s))",
            id,
            removal.topics.len(),
            removal.learning_outcomes.len(),
            removal.skill_bits.len()
        );
    }

    Ok(())
}
