//! Skill-bit CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::domain::{Direction, EntityId};
use crate::storage::Project;
use crate::store::{NewSkillBit, SkillBitPatch};

#[derive(Subcommand)]
pub enum SkillCommands {
    /// List the skill-bits of an outcome in manual order
    List {
        /// Outcome ID
        outcome: String,
    },

    /// Add a skill-bit
    Add {
        /// Outcome ID
        outcome: String,

        /// Skill-bit label
        label: String,

        #[arg(long)]
        id: Option<String>,

        /// 1-based position (appends otherwise)
        #[arg(long)]
        position: Option<u32>,
    },

    /// Edit a skill-bit
    Edit {
        /// Skill-bit ID
        id: String,

        #[arg(long)]
        label: Option<String>,

        /// Move to another outcome
        #[arg(long)]
        outcome: Option<String>,

        /// 1-based position
        #[arg(long)]
        position: Option<u32>,
    },

    /// Move a skill-bit one place up
    Up {
        /// Skill-bit ID
        id: String,
    },

    /// Move a skill-bit one place down
    Down {
        /// Skill-bit ID
        id: String,
    },

    /// Remove a skill-bit
    Rm {
        /// Skill-bit ID
        id: String,
    },
}

pub fn run(cmd: SkillCommands, output: &Output) -> Result<()> {
    match cmd {
        SkillCommands::List { outcome } => list_skill_bits(output, &outcome),
        SkillCommands::Add {
            outcome,
            label,
            id,
            position,
        } => {
            let input = NewSkillBit {
                id: id.map(|id| id.parse::<EntityId>()).transpose()?,
                label,
                outcome_id: outcome.parse::<EntityId>()?,
                manual_order: position,
            };
            add_skill_bit(output, input)
        }
        SkillCommands::Edit {
            id,
            label,
            outcome,
            position,
        } => {
            let patch = SkillBitPatch {
                label,
                outcome_id: outcome.map(|o| o.parse::<EntityId>()).transpose()?,
                manual_order: position,
            };
            edit_skill_bit(output, &id, patch)
        }
        SkillCommands::Up { id } => move_skill_bit(output, &id, Direction::Up),
        SkillCommands::Down { id } => move_skill_bit(output, &id, Direction::Down),
        SkillCommands::Rm { id } => remove_skill_bit(output, &id),
    }
}

fn list_skill_bits(output: &Output, outcome_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.open_store();

    let outcome: EntityId = outcome_str.parse()?;
    let bits = store.skill_bits_for_outcome(&outcome)?;

    if output.is_json() {
        output.data(&bits);
    } else if bits.is_empty() {
        println!("No skill-bits for {}", outcome);
    } else {
        println!("{:>4}  {:<40} LABEL", "#", "ID");
        println!("{}", "-".repeat(70));
        for bit in bits {
            println!("{:>4}  {:<40} {}", bit.manual_order, bit.id, bit.label);
        }
    }

    Ok(())
}

fn add_skill_bit(output: &Output, input: NewSkillBit) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let bit = store.create_skill_bit(input)?;

    if output.is_json() {
        output.data(&bit);
    } else {
        println!(
            "Created skill-bit: {} - {} (position {})",
            bit.id, bit.label, bit.manual_order
        );
    }

    Ok(())
}

fn edit_skill_bit(output: &Output, id_str: &str, patch: SkillBitPatch) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let bit = store.update_skill_bit(&id, patch)?;

    if output.is_json() {
        output.data(&bit);
    } else {
        println!("Updated skill-bit: {} (position {})", bit.id, bit.manual_order);
    }

    Ok(())
}

fn move_skill_bit(output: &Output, id_str: &str, direction: Direction) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    let moved = store.reorder_skill_bit(&id, direction)?;
    let position = store.skill_bit(&id)?.manual_order;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": id,
            "moved": moved,
            "position": position,
        }));
    } else if moved {
        println!("Moved skill-bit {} to position {}", id, position);
    } else {
        println!("Skill-bit {} already at position {}", id, position);
    }

    Ok(())
}

fn remove_skill_bit(output: &Output, id_str: &str) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store();

    let id: EntityId = id_str.parse()?;
    store.delete_skill_bit(&id)?;

    output.success(&format!("Removed skill-bit {}", id));
    Ok(())
}
