//! Dataset normalization
//!
//! Turns a [`RawDataset`] into a canonical [`Dataset`]. The two input shapes
//! go through separate pure functions that share only the allocator,
//! resolver and hierarchy primitives from [`crate::domain`].
//!
//! Normalization never fails: bad references are resolved by fallback
//! policies and every compromise is recorded in the [`IngestReport`].

mod combined;
mod fallback;
pub mod raw;
mod seed;
mod split;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Dataset, EntityId, EntityKind, UnplacedTopic};

pub use combined::normalize_combined;
pub use raw::{CombinedInput, RawDataset, SplitInput, StringList};
pub use seed::seed_dataset;
pub use split::normalize_split;

/// Which input layout a dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    Split,
    Combined,
}

impl std::fmt::Display for InputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputShape::Split => f.write_str("split"),
            InputShape::Combined => f.write_str("combined"),
        }
    }
}

/// A relation reference that did not resolve to an outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRelation {
    pub outcome: EntityId,
    pub reference: String,
}

/// A skill-bit whose owning outcome could not be found
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedSkillBit {
    pub label: String,
    pub reference: Option<String>,
}

/// A record moved to a fallback owner because its reference was unknown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reassignment {
    pub kind: EntityKind,
    pub id: EntityId,
    pub missing: Option<String>,
    pub assigned_to: EntityId,
}

/// A record skipped because its ID was already taken
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRecord {
    pub kind: EntityKind,
    pub id: EntityId,
}

/// What normalization had to compromise on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub shape: InputShape,

    /// ID of the lazily created "Unspecified" subject, if it was needed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_subject: Option<EntityId>,

    pub synthesized_topics: Vec<EntityId>,
    pub rejected_parents: Vec<UnplacedTopic>,
    pub dropped_relations: Vec<DroppedRelation>,
    pub dropped_skill_bits: Vec<DroppedSkillBit>,
    pub reassigned: Vec<Reassignment>,
    pub duplicates: Vec<DuplicateRecord>,
}

impl IngestReport {
    pub fn new(shape: InputShape) -> Self {
        Self {
            shape,
            fallback_subject: None,
            synthesized_topics: Vec::new(),
            rejected_parents: Vec::new(),
            dropped_relations: Vec::new(),
            dropped_skill_bits: Vec::new(),
            reassigned: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    /// Returns true if the input was taken over without any compromise
    pub fn is_clean(&self) -> bool {
        self.fallback_subject.is_none()
            && self.synthesized_topics.is_empty()
            && self.rejected_parents.is_empty()
            && self.dropped_relations.is_empty()
            && self.dropped_skill_bits.is_empty()
            && self.reassigned.is_empty()
            && self.duplicates.is_empty()
    }
}

/// A canonical dataset plus the report of how it was derived
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub dataset: Dataset,
    pub report: IngestReport,
}

/// Normalizes either input shape
pub fn normalize(raw: &RawDataset, now: DateTime<Utc>) -> Normalized {
    match raw {
        RawDataset::Split(input) => split::normalize_split(input, now),
        RawDataset::Combined(input) => combined::normalize_combined(input, now),
    }
}

/// Trims a free-text field, mapping blank values to `None`
pub(crate) fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_trims_and_drops_blanks() {
        assert_eq!(clean_text(Some("  Algebra ")), Some("Algebra".to_string()));
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn empty_report_is_clean() {
        let report = IngestReport::new(InputShape::Combined);
        assert!(report.is_clean());
        assert_eq!(report.shape.to_string(), "combined");
    }
}
