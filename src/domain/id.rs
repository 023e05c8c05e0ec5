//! Identifier allocation for curriculum entities
//!
//! IDs are human-readable slugs derived from a label:
//! - `"Algebra og funksjonar"` becomes `algebra-og-funksjonar`
//! - `"Bærekraftig utvikling"` becomes `baerekraftig-utvikling`
//! - a label with no usable characters falls back to `{prefix}-{index}`
//!
//! Collisions are resolved per entity kind: the first occurrence of a slug
//! keeps it, the Nth occurrence becomes `{slug}-{N}`. Allocation depends only
//! on the order of calls, so normalizing the same input twice yields the
//! same IDs.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Entity ID must not be empty")]
    Empty,

    #[error("Invalid entity ID '{0}': IDs must not contain whitespace")]
    Whitespace(String),
}

/// The four kinds of curriculum entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Subject,
    Topic,
    LearningOutcome,
    SkillBit,
}

impl EntityKind {
    /// Prefix used for positional fallback IDs
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Subject => "subject",
            EntityKind::Topic => "topic",
            EntityKind::LearningOutcome => "outcome",
            EntityKind::SkillBit => "skill",
        }
    }

    /// Human-readable name for messages
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Subject => "Subject",
            EntityKind::Topic => "Topic",
            EntityKind::LearningOutcome => "Learning outcome",
            EntityKind::SkillBit => "Skill-bit",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Identifier of a curriculum entity
///
/// Upstream datasets may carry arbitrary identifiers (slugs, UUIDs, codes),
/// so deserialization accepts any string. IDs typed by a user go through
/// [`FromStr`], which rejects empty and whitespace-containing values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps an already-trusted identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(IdError::Whitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Converts free text into a URL-safe slug
///
/// Lowercases, folds diacritics to base Latin letters and collapses every
/// run of other characters into a single hyphen. Returns an empty string
/// when nothing usable remains.
pub fn slugify(source: &str) -> String {
    let mut slug = String::with_capacity(source.len());
    let mut pending_hyphen = false;

    for c in fold_diacritics(source).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Maps letters without a canonical decomposition (æ, ø) explicitly and
/// strips combining marks from everything else (å, é, ü, ...)
fn fold_diacritics(source: &str) -> String {
    let mut mapped = String::with_capacity(source.len());
    for c in source.chars() {
        match c {
            'æ' => mapped.push_str("ae"),
            'Æ' => mapped.push_str("AE"),
            'ø' => mapped.push('o'),
            'Ø' => mapped.push('O'),
            _ => mapped.push(c),
        }
    }

    mapped.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Allocates collision-free slugs, one namespace per [`EntityKind`]
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    /// Occurrences seen per (kind, base slug)
    counters: HashMap<(EntityKind, String), u32>,

    /// Every ID handed out or reserved, per kind
    issued: HashSet<(EntityKind, String)>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that will never hand out any of `existing`
    pub fn with_reserved<'a>(
        kind: EntityKind,
        existing: impl IntoIterator<Item = &'a EntityId>,
    ) -> Self {
        let mut allocator = Self::new();
        for id in existing {
            allocator.reserve(kind, id);
        }
        allocator
    }

    /// Marks an ID as taken without counting it as an occurrence
    pub fn reserve(&mut self, kind: EntityKind, id: &EntityId) {
        self.issued.insert((kind, id.as_str().to_string()));
    }

    /// Returns true if the ID was already allocated or reserved
    pub fn is_taken(&self, kind: EntityKind, id: &str) -> bool {
        self.issued.contains(&(kind, id.to_string()))
    }

    /// Allocates an ID for `source`, falling back to `{prefix}-{index}`
    pub fn allocate(&mut self, kind: EntityKind, source: &str, index: usize) -> EntityId {
        let mut base = slugify(source);
        if base.is_empty() {
            base = format!("{}-{}", kind.prefix(), index);
        }

        let counter = self.counters.entry((kind, base.clone())).or_insert(0);
        loop {
            *counter += 1;
            let candidate = if *counter == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, counter)
            };

            if self.issued.insert((kind, candidate.clone())) {
                return EntityId(candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Solve linear equations"), "solve-linear-equations");
        assert_eq!(slugify("  --Hello,   World!-- "), "hello-world");
        assert_eq!(slugify("Grade 10"), "grade-10");
    }

    #[test]
    fn slugify_folds_curriculum_diacritics() {
        assert_eq!(slugify("Bærekraftig utvikling"), "baerekraftig-utvikling");
        assert_eq!(slugify("Økonomi"), "okonomi");
        assert_eq!(slugify("Språk og kultur"), "sprak-og-kultur");
        assert_eq!(slugify("Idé"), "ide");
        assert_eq!(slugify("ÆØÅ"), "aeoa");
    }

    #[test]
    fn slugify_folds_estonian_letters() {
        assert_eq!(slugify("Õppimine ja ühiskond"), "oppimine-ja-uhiskond");
        assert_eq!(slugify("Kääbuspäike ja töö"), "kaabuspaike-ja-too");
        assert_eq!(slugify("ÕÄÖÜ"), "oaou");
        assert_eq!(slugify("Šokolaad ja žürii"), "sokolaad-ja-zurii");
    }

    #[test]
    fn slugify_empty_when_nothing_usable() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!! ???"), "");
        assert_eq!(slugify("Ωμέγα"), "");
    }

    #[test]
    fn first_occurrence_keeps_the_slug() {
        let mut ids = IdAllocator::new();

        let first = ids.allocate(EntityKind::Topic, "Algebra", 0);
        let second = ids.allocate(EntityKind::Topic, "algebra", 1);
        let third = ids.allocate(EntityKind::Topic, "ALGEBRA!", 2);

        assert_eq!(first.as_str(), "algebra");
        assert_eq!(second.as_str(), "algebra-2");
        assert_eq!(third.as_str(), "algebra-3");
    }

    #[test]
    fn empty_slug_uses_positional_fallback() {
        let mut ids = IdAllocator::new();

        assert_eq!(ids.allocate(EntityKind::Topic, "???", 3).as_str(), "topic-3");
        assert_eq!(ids.allocate(EntityKind::SkillBit, "", 0).as_str(), "skill-0");
        assert_eq!(
            ids.allocate(EntityKind::LearningOutcome, " ", 7).as_str(),
            "outcome-7"
        );
    }

    #[test]
    fn kinds_have_separate_namespaces() {
        let mut ids = IdAllocator::new();

        let subject = ids.allocate(EntityKind::Subject, "Mathematics", 0);
        let topic = ids.allocate(EntityKind::Topic, "Mathematics", 0);

        assert_eq!(subject, topic);
        assert!(ids.is_taken(EntityKind::Subject, "mathematics"));
        assert!(!ids.is_taken(EntityKind::SkillBit, "mathematics"));
    }

    #[test]
    fn literal_suffix_is_never_reissued() {
        let mut ids = IdAllocator::new();

        let literal = ids.allocate(EntityKind::Topic, "Unit 2", 0);
        let unit = ids.allocate(EntityKind::Topic, "Unit", 1);
        let unit_again = ids.allocate(EntityKind::Topic, "Unit", 2);

        assert_eq!(literal.as_str(), "unit-2");
        assert_eq!(unit.as_str(), "unit");
        assert_eq!(unit_again.as_str(), "unit-3");
    }

    #[test]
    fn reserved_ids_are_skipped() {
        let existing = [EntityId::new("algebra")];
        let mut ids = IdAllocator::with_reserved(EntityKind::Topic, existing.iter());

        assert_eq!(ids.allocate(EntityKind::Topic, "Algebra", 0).as_str(), "algebra-2");
    }

    #[test]
    fn entity_id_parse_rejects_blank_and_whitespace() {
        assert_eq!("".parse::<EntityId>(), Err(IdError::Empty));
        assert_eq!("   ".parse::<EntityId>(), Err(IdError::Empty));
        assert!(matches!(
            "two words".parse::<EntityId>(),
            Err(IdError::Whitespace(_))
        ));
        assert_eq!(" algebra ".parse::<EntityId>().unwrap().as_str(), "algebra");
    }

    #[test]
    fn serde_is_a_plain_string() {
        let id = EntityId::new("solve-linear-equations");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"solve-linear-equations\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    proptest! {
        #[test]
        fn allocation_is_deterministic(labels in prop::collection::vec(".{0,12}", 0..40)) {
            let run = || {
                let mut ids = IdAllocator::new();
                labels
                    .iter()
                    .enumerate()
                    .map(|(i, label)| ids.allocate(EntityKind::Topic, label, i))
                    .collect::<Vec<_>>()
            };

            prop_assert_eq!(run(), run());
        }

        #[test]
        fn allocated_ids_are_unique_slugs(labels in prop::collection::vec("[a-c -]{0,4}", 0..40)) {
            let mut ids = IdAllocator::new();
            let mut seen = HashSet::new();

            for (i, label) in labels.iter().enumerate() {
                let id = ids.allocate(EntityKind::Topic, label, i);
                prop_assert!(!id.as_str().is_empty());
                prop_assert!(!id.as_str().starts_with('-'));
                prop_assert!(!id.as_str().ends_with('-'));
                prop_assert!(seen.insert(id));
            }
        }
    }
}
