//! Built-in seed dataset, used before anything has been loaded

use chrono::DateTime;

use super::raw::{CombinedInput, CombinedOutcome, CombinedSkillBit, CombinedTopic, StringList};
use super::{normalize_combined, Normalized};

const SEED_TIMESTAMP: i64 = 1_704_067_200;

fn topic(text: &str, parent: Option<&str>) -> CombinedTopic {
    CombinedTopic {
        text: Some(text.to_string()),
        subject: StringList::from(["Mathematics"]),
        parent: parent.map(|p| StringList::from([p])).unwrap_or_default(),
        ..Default::default()
    }
}

fn outcome(text: &str, topic: &str, grade: &str, expects: &[&str]) -> CombinedOutcome {
    CombinedOutcome {
        text: Some(text.to_string()),
        subject: StringList::from(["Mathematics"]),
        topic: StringList::from([topic]),
        grade: Some(grade.to_string()),
        expects: StringList(expects.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    }
}

fn skill(text: &str, outcome: &str) -> CombinedSkillBit {
    CombinedSkillBit {
        text: Some(text.to_string()),
        outcome: StringList::from([outcome]),
        order: None,
    }
}

/// Small deterministic dataset: same IDs and timestamps on every call
pub fn seed_dataset() -> Normalized {
    let input = CombinedInput {
        subjects: vec!["Mathematics".to_string()],
        topics: vec![
            topic("Numbers", None),
            topic("Algebra", None),
            topic("Linear equations", Some("Algebra")),
        ],
        learning_outcomes: vec![
            outcome("Count and compare whole numbers", "Numbers", "1", &[]),
            outcome(
                "Add and subtract whole numbers",
                "Numbers",
                "2",
                &["Count and compare whole numbers"],
            ),
            outcome(
                "Solve linear equations in one unknown",
                "Linear equations",
                "8",
                &["Add and subtract whole numbers"],
            ),
        ],
        skill_bits: vec![
            skill("Count objects up to 20", "Count and compare whole numbers"),
            skill("Use the symbols < and >", "Count and compare whole numbers"),
            skill("Isolate the unknown", "Solve linear equations in one unknown"),
            skill("Check the solution", "Solve linear equations in one unknown"),
        ],
    };

    let now = DateTime::from_timestamp(SEED_TIMESTAMP, 0).unwrap_or_default();
    normalize_combined(&input, now)
}
