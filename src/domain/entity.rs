//! Curriculum entities
//!
//! Subjects own topics, topics own learning outcomes and outcomes own
//! skill-bits. Every entity carries a creation and a last-update timestamp;
//! update operations always refresh the latter via `touch`.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Publication status of a subject, topic or outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Published => "published",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublicationStatus::Published)
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PublicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PublicationStatus::Draft),
            "published" => Ok(PublicationStatus::Published),
            other => Err(format!(
                "Invalid status '{}': expected 'draft' or 'published'",
                other
            )),
        }
    }
}

/// A curriculum subject area (e.g. Mathematics)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: EntityId,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Canonical URI in the upstream curriculum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default)]
    pub status: PublicationStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Subject {
    pub fn new(id: EntityId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            uri: None,
            status: PublicationStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// A subdivision of a subject; topics form a forest through `parent_topic_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: EntityId,

    pub name: String,

    /// Name in the secondary written language, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_localized: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    pub subject_id: EntityId,

    /// Parent in the same subject; `None` for root topics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_topic_id: Option<EntityId>,

    /// Display-order hint among siblings
    #[serde(default)]
    pub sort_order: i64,

    #[serde(default)]
    pub status: PublicationStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        subject_id: EntityId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            name_localized: None,
            description: None,
            uri: None,
            subject_id,
            parent_topic_id: None,
            sort_order: 0,
            status: PublicationStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_topic_id.is_none()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// A measurable ability attached to a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub id: EntityId,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_localized: Option<String>,

    pub topic_id: EntityId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,

    #[serde(default)]
    pub sort_order: i64,

    #[serde(default)]
    pub status: PublicationStatus,

    /// Prerequisite outcomes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expects: Vec<EntityId>,

    /// Sub-outcomes this outcome is composed of
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consists_of: Vec<EntityId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl LearningOutcome {
    pub fn new(
        id: EntityId,
        text: impl Into<String>,
        topic_id: EntityId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            text_localized: None,
            topic_id,
            uri: None,
            school_level: None,
            grade: None,
            sort_order: 0,
            status: PublicationStatus::Draft,
            expects: Vec::new(),
            consists_of: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if either relation list mentions `id`
    pub fn references(&self, id: &EntityId) -> bool {
        self.expects.contains(id) || self.consists_of.contains(id)
    }

    /// Removes every ID in `removed` from both relation lists, returning true
    /// if anything changed
    pub fn remove_relations(&mut self, removed: &HashSet<&EntityId>) -> bool {
        let before = self.expects.len() + self.consists_of.len();
        self.expects.retain(|e| !removed.contains(e));
        self.consists_of.retain(|c| !removed.contains(c));
        before != self.expects.len() + self.consists_of.len()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// A fine-grained, manually ordered capability statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillBit {
    pub id: EntityId,

    pub label: String,

    pub outcome_id: EntityId,

    /// 1-based position among the outcome's skill-bits
    pub manual_order: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl SkillBit {
    pub fn new(
        id: EntityId,
        label: impl Into<String>,
        outcome_id: EntityId,
        manual_order: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            outcome_id,
            manual_order,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Entities displayed by an order hint, newest first on ties
pub trait DisplayOrdered {
    fn sort_order(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
}

impl DisplayOrdered for Topic {
    fn sort_order(&self) -> i64 {
        self.sort_order
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl DisplayOrdered for LearningOutcome {
    fn sort_order(&self) -> i64 {
        self.sort_order
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Order hint ascending, then creation time descending
pub fn display_order<T: DisplayOrdered>(a: &T, b: &T) -> Ordering {
    a.sort_order()
        .cmp(&b.sort_order())
        .then_with(|| b.created_at().cmp(&a.created_at()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn topic(id: &str, order: i64, created: DateTime<Utc>) -> Topic {
        let mut t = Topic::new(EntityId::new(id), id, EntityId::new("math"), created);
        t.sort_order = order;
        t
    }

    #[test]
    fn status_parses_and_displays() {
        assert_eq!(
            "Published".parse::<PublicationStatus>(),
            Ok(PublicationStatus::Published)
        );
        assert_eq!(
            "draft".parse::<PublicationStatus>(),
            Ok(PublicationStatus::Draft)
        );
        assert!("archived".parse::<PublicationStatus>().is_err());
        assert_eq!(PublicationStatus::Published.to_string(), "published");
    }

    #[test]
    fn display_order_breaks_ties_by_recency() {
        let now = Utc::now();
        let older = topic("older", 1, now);
        let newer = topic("newer", 1, now + Duration::seconds(5));
        let first = topic("first", 0, now);

        let mut topics = vec![older.clone(), newer.clone(), first.clone()];
        topics.sort_by(display_order);

        let ids: Vec<_> = topics.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "newer", "older"]);
    }

    #[test]
    fn remove_relation_strips_both_lists() {
        let now = Utc::now();
        let gone = EntityId::new("gone");
        let kept = EntityId::new("kept");

        let mut outcome = LearningOutcome::new(EntityId::new("o"), "O", EntityId::new("t"), now);
        outcome.expects = vec![gone.clone(), kept.clone()];
        outcome.consists_of = vec![gone.clone()];

        assert!(outcome.references(&gone));
        assert!(outcome.remove_relations(&HashSet::from([&gone])));
        assert!(!outcome.references(&gone));
        assert_eq!(outcome.expects, vec![kept]);
        assert!(!outcome.remove_relations(&HashSet::from([&gone])));
    }

    #[test]
    fn serde_roundtrip_skips_empty_optionals() {
        let now = Utc::now();
        let subject = Subject::new(EntityId::new("math"), "Mathematics", now);

        let json = serde_json::to_value(&subject).unwrap();
        assert!(json.get("description").is_none());
        assert_eq!(json["status"], "draft");

        let parsed: Subject = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, subject);
    }
}
