//! Learning outcome CLI commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::output::Output;
use crate::domain::{EntityId, LearningOutcome, PublicationStatus};
use crate::storage::Project;
use crate::store::{CurriculumStore, NewOutcome, OutcomePatch};

#[derive(Subcommand)]
pub enum OutcomeCommands {
    /// List learning outcomes (all, or of one topic)
    List {
        /// Topic ID
        #[arg(long)]
        topic: Option<String>,
    },

    /// Show outcome details with its skill-bits
    Show {
        /// Outcome ID
        id: String,
    },

    /// Add a learning outcome
    ///
    /// Examples:
    ///   curriculum outcome add algebra "Solve quadratic equations"
    ///   curriculum outcome add algebra "Factorise" --expects add-and-subtract-whole-numbers
    Add {
        /// Topic ID
        topic: String,

        /// Outcome statement
        text: String,

        /// Explicit ID (derived from the text otherwise)
        #[arg(long)]
        id: Option<String>,

        /// Prerequisite outcome IDs (comma-separated)
        #[arg(long, value_delimiter = ',')]
        expects: Vec<String>,

        /// Component outcome IDs (comma-separated)
        #[arg(long, value_delimiter = ',')]
        consists_of: Vec<String>,

        /// Statement in the secondary language
        #[arg(long)]
        localized: Option<String>,

        #[arg(long)]
        grade: Option<String>,

        /// School level
        #[arg(long)]
        level: Option<String>,

        #[arg(long)]
        uri: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        order: Option<i64>,

        /// draft or published
        #[arg(long, default_value = "draft")]
        status: PublicationStatus,
    },

    /// Edit a learning outcome
    ///
    /// Relation flags replace the whole list; pass the flag with no value to
    /// clear it. Empty strings clear optional text fields.
    Edit {
        /// Outcome ID
        id: String,

        #[arg(long)]
        text: Option<String>,

        /// Move to another topic
        #[arg(long)]
        topic: Option<String>,

        #[arg(long, value_delimiter = ',', num_args = 0..)]
        expects: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',', num_args = 0..)]
        consists_of: Option<Vec<String>>,

        #[arg(long)]
        localized: Option<String>,

        #[arg(long)]
        grade: Option<String>,

        #[arg(long)]
        level: Option<String>,

        #[arg(long)]
        uri: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        order: Option<i64>,

        #[arg(long)]
        status: Option<PublicationStatus>,
    },

    /// Show prerequisites, dependents, parts and the learning path
    Relations {
        /// Outcome ID
        id: String,
    },

    /// Remove an outcome and its skill-bits
    Rm {
        /// Outcome ID
        id: String,
    },
}

fn parse_ids(values: Vec<String>) -> Result<Vec<EntityId>> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<EntityId>().map_err(Into::into))
        .collect()
}

pub fn run(cmd: OutcomeCommands, output: &Output) -> Result<()> {
    match cmd {
        OutcomeCommands::List { topic } => list_outcomes(output, topic.as_deref()),
        OutcomeCommands::Show { id } => show_outcome(output, &id),
        OutcomeCommands::Add {
            topic,
            text,
            id,
            expects,
            consists_of,
            localized,
            grade,
            level,
            uri,
            order,
            status,
        } => {
            let input = NewOutcome {
                id: id.map(|id| id.parse::<EntityId>()).transpose()?,
                text,
                text_localized: localized,
                topic_id: topic.parse::<EntityId>()?,
                uri,
                school_level: level,
                grade,
                sort_order: order,
                status,
                expects: parse_ids(expects)?,
                consists_of: parse_ids(consists_of)?,
            };
            add_outcome(output, input)
        }
        OutcomeCommands::Edit {
            id,
            text,
            topic,
            expects,
            consists_of,
            localized,
            grade,
            level,
            uri,
            order,
            status,
        } => {
            let patch = OutcomePatch {
                text,
                text_localized: localized.map(Some),
                topic_id: topic.map(|t| t.parse::<EntityId>()).transpose()?,
                uri: uri.map(Some),
                school_level: level.map(Some),
                grade: grade.map(Some),
                sort_order: order,
                status,
                expects: expects.map(parse_ids).transpose()?,
                consists_of: consists_of.map(parse_ids).transpose()?,
            };
            edit_outcome(output, &id, patch)
        }
        OutcomeCommands::Relations { id } => show_relations(output, &id),
        OutcomeCommands::Rm { id } => remove_outcome(output, &id),
    }
}

fn list_outcomes(output: &Output, topic_str: Option<&str>) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let outcomes: Vec<&LearningOutcome> = match topic_str {
        Some(topic) => store.outcomes_for_topic(&topic.parse::<EntityId>()?)?,
        None => store.outcomes().iter().collect(),
    };

    if output.is_json() {
        output.data(&outcomes);
    } else if outcomes.is_empty() {
        println!("No learning outcomes");
    } else {
        println!("{:<40} {:<20} {:>6} TEXT", "ID", "TOPIC", "SKILLS");
        println!("{}", "-".repeat(90));

        for outcome in outcomes {
            let skills = store.skill_bit_count(&outcome.id)?;
            println!(
                "{:<40} {:<20} {:>6} {}",
                outcome.id, outcome.topic_id, skills, outcome.text
            );
        }
    }

    Ok(())
}

fn show_outcome(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let outcome = store.outcome(&id)?;
    let skill_bits = store.skill_bits_for_outcome(&id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "outcome": outcome,
            "skill_bits": skill_bits,
        }));
    } else {
        println!("Outcome: {}", outcome.id);
        println!("Text: {}", outcome.text);
        if let Some(localized) = &outcome.text_localized {
            println!("Localized: {}", localized);
        }
        println!("Topic: {}", outcome.topic_id);
        if let Some(level) = &outcome.school_level {
            println!("School level: {}", level);
        }
        if let Some(grade) = &outcome.grade {
            println!("Grade: {}", grade);
        }
        println!("Status: {}", outcome.status);
        println!("Updated: {}", outcome.updated_at.format("%Y-%m-%d %H:%M"));

        if !outcome.expects.is_empty() {
            println!("\nExpects:");
            for dep in &outcome.expects {
                println!("  - {}", dep);
            }
        }

        if !outcome.consists_of.is_empty() {
            println!("\nConsists of:");
            for part in &outcome.consists_of {
                println!("  - {}", part);
            }
        }

        if !skill_bits.is_empty() {
            println!("\nSkill-bits:");
            for bit in &skill_bits {
                println!("  {}. {} ({})", bit.manual_order, bit.label, bit.id);
            }
        }
    }

    Ok(())
}

fn add_outcome(output: &Output, input: NewOutcome) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let outcome = store.create_outcome(input)?;

    if output.is_json() {
        output.data(&outcome);
    } else {
        println!("Created learning outcome: {} - {}", outcome.id, outcome.text);
    }

    Ok(())
}

fn edit_outcome(output: &Output, id_str: &str, patch: OutcomePatch) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let outcome = store.update_outcome(&id, patch)?;

    if output.is_json() {
        output.data(&outcome);
    } else {
        println!("Updated learning outcome: {}", outcome.id);
    }

    Ok(())
}

#[derive(Serialize)]
struct Relations {
    id: EntityId,
    prerequisites: Vec<EntityId>,
    dependents: Vec<EntityId>,
    parts: Vec<EntityId>,
    part_of: Vec<EntityId>,
    learning_path: Vec<EntityId>,
}

fn collect_relations(store: &CurriculumStore, id: EntityId) -> Result<Relations> {
    store.outcome(&id)?;
    let graph = store.relation_graph();

    Ok(Relations {
        prerequisites: graph.prerequisites(&id),
        dependents: graph.dependents(&id),
        parts: graph.parts(&id),
        part_of: graph.part_of(&id),
        learning_path: graph.learning_path(&id)?,
        id,
    })
}

fn print_ids(store: &CurriculumStore, heading: &str, ids: &[EntityId], numbered: bool) {
    if ids.is_empty() {
        return;
    }
    println!("\n{}:", heading);
    for (i, id) in ids.iter().enumerate() {
        let text = store.outcome(id).map(|o| o.text.as_str()).unwrap_or("?");
        if numbered {
            println!("  {}. {} - {}", i + 1, id, text);
        } else {
            println!("  - {} - {}", id, text);
        }
    }
}

fn show_relations(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let relations = collect_relations(&store, id_str.parse::<EntityId>()?)?;

    if output.is_json() {
        output.data(&relations);
        return Ok(());
    }

    println!("Relations of {}", relations.id);
    print_ids(&store, "Expects", &relations.prerequisites, false);
    print_ids(&store, "Expected by", &relations.dependents, false);
    print_ids(&store, "Consists of", &relations.parts, false);
    print_ids(&store, "Part of", &relations.part_of, false);
    print_ids(&store, "Learning path", &relations.learning_path, true);

    Ok(())
}

fn remove_outcome(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let removal = store.delete_outcome(&id)?;

    if output.is_json() {
        output.data(&removal);
    } else {
        println!(
            "Removed learning outcome {} ({} skill-bit(s))",
            id,
            removal.skill_bits.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CurriculumStore;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    #[test]
    fn parse_ids_skips_blanks() {
        let ids = parse_ids(vec!["a".into(), " ".into(), " b ".into()]).unwrap();
        assert_eq!(ids, vec![id("a"), id("b")]);
    }

    #[test]
    fn parse_ids_rejects_malformed() {
        assert!(parse_ids(vec!["Not An Id".into()]).is_err());
    }

    #[test]
    fn relations_follow_the_seed_chain() {
        let store = CurriculumStore::in_memory();
        let relations =
            collect_relations(&store, id("solve-linear-equations-in-one-unknown")).unwrap();

        assert_eq!(relations.prerequisites, vec![id("add-and-subtract-whole-numbers")]);
        assert_eq!(
            relations.learning_path,
            vec![id("count-and-compare-whole-numbers"), id("add-and-subtract-whole-numbers")]
        );
        assert!(relations.dependents.is_empty());
    }

    #[test]
    fn relations_of_unknown_outcome_fail() {
        let store = CurriculumStore::in_memory();
        assert!(collect_relations(&store, id("missing")).is_err());
    }
}
