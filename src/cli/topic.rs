//! Topic CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::domain::{EntityId, PublicationStatus, Topic, TopicNode};
use crate::storage::Project;
use crate::store::{NewTopic, TopicPatch};

#[derive(Subcommand)]
pub enum TopicCommands {
    /// List topics (all, or of one subject)
    List {
        /// Subject ID
        #[arg(long)]
        subject: Option<String>,
    },

    /// Show a subject's topic tree
    Tree {
        /// Subject ID
        subject: String,
    },

    /// Show topic details
    Show {
        /// Topic ID
        id: String,
    },

    /// Add a topic
    ///
    /// Examples:
    ///   curriculum topic add mathematics "Algebra"
    ///   curriculum topic add mathematics "Linear equations" --parent algebra
    Add {
        /// Subject ID
        subject: String,

        /// Topic name
        name: String,

        /// Explicit ID (derived from the name otherwise)
        #[arg(long)]
        id: Option<String>,

        /// Parent topic ID (same subject)
        #[arg(long)]
        parent: Option<String>,

        /// Display-order hint (defaults to after the last sibling)
        #[arg(long, allow_negative_numbers = true)]
        order: Option<i64>,

        /// Name in the secondary language
        #[arg(long)]
        localized: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        uri: Option<String>,

        /// draft or published
        #[arg(long, default_value = "draft")]
        status: PublicationStatus,
    },

    /// Edit a topic; pass an empty string to clear an optional text field
    Edit {
        /// Topic ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        /// Move the topic and its subtree to another subject
        #[arg(long)]
        subject: Option<String>,

        /// New parent topic ID
        #[arg(long, conflicts_with = "root")]
        parent: Option<String>,

        /// Detach from the parent
        #[arg(long)]
        root: bool,

        #[arg(long, allow_negative_numbers = true)]
        order: Option<i64>,

        #[arg(long)]
        localized: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        uri: Option<String>,

        #[arg(long)]
        status: Option<PublicationStatus>,
    },

    /// Remove a topic with its descendants, outcomes and skill-bits
    Rm {
        /// Topic ID
        id: String,
    },
}

pub fn run(cmd: TopicCommands, output: &Output) -> Result<()> {
    match cmd {
        TopicCommands::List { subject } => list_topics(output, subject.as_deref()),
        TopicCommands::Tree { subject } => show_tree(output, &subject),
        TopicCommands::Show { id } => show_topic(output, &id),
        TopicCommands::Add {
            subject,
            name,
            id,
            parent,
            order,
            localized,
            description,
            uri,
            status,
        } => {
            let input = NewTopic {
                id: id.map(|id| id.parse::<EntityId>()).transpose()?,
                name,
                name_localized: localized,
                description,
                uri,
                subject_id: subject.parse::<EntityId>()?,
                parent_topic_id: parent.map(|p| p.parse::<EntityId>()).transpose()?,
                sort_order: order,
                status,
            };
            add_topic(output, input)
        }
        TopicCommands::Edit {
            id,
            name,
            subject,
            parent,
            root,
            order,
            localized,
            description,
            uri,
            status,
        } => {
            let parent_topic_id = if root {
                Some(None)
            } else {
                parent.map(|p| p.parse::<EntityId>().map(Some)).transpose()?
            };
            let patch = TopicPatch {
                name,
                name_localized: localized.map(Some),
                description: description.map(Some),
                uri: uri.map(Some),
                subject_id: subject.map(|s| s.parse::<EntityId>()).transpose()?,
                parent_topic_id,
                sort_order: order,
                status,
            };
            edit_topic(output, &id, patch)
        }
        TopicCommands::Rm { id } => remove_topic(output, &id),
    }
}

fn list_topics(output: &Output, subject_str: Option<&str>) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let topics: Vec<&Topic> = match subject_str {
        Some(subject) => {
            let subject: EntityId = subject.parse()?;
            store.subject(&subject)?;
            store
                .topics()
                .iter()
                .filter(|t| t.subject_id == subject)
                .collect()
        }
        None => store.topics().iter().collect(),
    };

    if output.is_json() {
        output.data(&topics);
    } else if topics.is_empty() {
        println!("No topics");
    } else {
        println!("{:<28} {:<20} {:<28} NAME", "ID", "SUBJECT", "PARENT");
        println!("{}", "-".repeat(90));

        for topic in topics {
            let parent = topic
                .parent_topic_id
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<28} {:<20} {:<28} {}",
                topic.id, topic.subject_id, parent, topic.name
            );
        }
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct TreeItem<'a> {
    id: &'a EntityId,
    name: &'a str,
    depth: usize,
    outcomes: usize,
}

fn print_node(node: &TopicNode<'_>, depth: usize, outcome_counts: &dyn Fn(&EntityId) -> usize) {
    println!(
        "{}{} ({}) [{} outcome(s)]",
        "  ".repeat(depth),
        node.topic.name,
        node.topic.id,
        outcome_counts(&node.topic.id)
    );
    for child in &node.children {
        print_node(child, depth + 1, outcome_counts);
    }
}

fn show_tree(output: &Output, subject_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let subject: EntityId = subject_str.parse()?;
    let title = store.subject(&subject)?.title.clone();
    let outcome_counts = |topic: &EntityId| store.dataset().outcomes_for_topic(topic).count();

    if output.is_json() {
        let items: Vec<TreeItem<'_>> = store
            .topics_with_depth(&subject)?
            .into_iter()
            .map(|(topic, depth)| TreeItem {
                id: &topic.id,
                name: &topic.name,
                depth,
                outcomes: outcome_counts(&topic.id),
            })
            .collect();
        output.data(&items);
    } else {
        let roots = store.topic_tree(&subject)?;
        println!("{} ({})", title, subject);
        if roots.is_empty() {
            println!("  No topics");
        }
        for root in &roots {
            print_node(root, 1, &outcome_counts);
        }
    }

    Ok(())
}

fn show_topic(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let topic = store.topic(&id)?;
    let outcomes = store.outcomes_for_topic(&id)?;
    let children: Vec<&Topic> = store
        .topics()
        .iter()
        .filter(|t| t.parent_topic_id.as_ref() == Some(&id))
        .collect();

    if output.is_json() {
        output.data(&serde_json::json!({
            "topic": topic,
            "children": children.iter().map(|t| t.id.to_string()).collect::<Vec<_>>(),
            "outcomes": outcomes.iter().map(|o| o.id.to_string()).collect::<Vec<_>>(),
        }));
    } else {
        println!("Topic: {}", topic.id);
        println!("Name: {}", topic.name);
        if let Some(localized) = &topic.name_localized {
            println!("Localized: {}", localized);
        }
        println!("Subject: {}", topic.subject_id);
        match &topic.parent_topic_id {
            Some(parent) => println!("Parent: {}", parent),
            None => println!("Parent: (root)"),
        }
        println!("Order: {}", topic.sort_order);
        println!("Status: {}", topic.status);
        println!("Updated: {}", topic.updated_at.format("%Y-%m-%d %H:%M"));

        if let Some(desc) = &topic.description {
            println!("\nDescription:");
            println!("{}", desc);
        }

        if !children.is_empty() {
            println!("\nSubtopics:");
            for child in &children {
                println!("  {} - {}", child.id, child.name);
            }
        }

        if !outcomes.is_empty() {
            println!("\nLearning outcomes:");
            for outcome in &outcomes {
                println!("  {} - {}", outcome.id, outcome.text);
            }
        }
    }

    Ok(())
}

fn add_topic(output: &Output, input: NewTopic) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let topic = store.create_topic(input)?;

    if output.is_json() {
        output.data(&topic);
    } else {
        println!("Created topic: {} - {}", topic.id, topic.name);
    }

    Ok(())
}

fn edit_topic(output: &Output, id_str: &str, patch: TopicPatch) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let topic = store.update_topic(&id, patch)?;

    if output.is_json() {
        output.data(&topic);
    } else {
        println!("Updated topic: {}", topic.id);
    }

    Ok(())
}

fn remove_topic(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let removal = store.delete_topic(&id)?;

    if output.is_json() {
        output.data(&removal);
    } else {
        println!(
            "Removed topic {} ({} subtopic(s), {} outcome(s), {} skill-bit(s))",
            id,
            removal.topics.len().saturating_sub(1),
            removal.learning_outcomes.len(),
            removal.skill_bits.len()
        );
    }

    Ok(())
}
