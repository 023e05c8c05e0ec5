//! Create and update payloads
//!
//! `New*` types carry everything needed to create an entity; a missing `id`
//! is allocated from the label. `*Patch` types are partial updates: `None`
//! leaves a field untouched, and for optional fields `Some(None)` clears it.

use crate::domain::{EntityId, PublicationStatus};

#[derive(Debug, Clone, Default)]
pub struct NewSubject {
    pub id: Option<EntityId>,
    pub title: String,
    pub description: Option<String>,
    pub uri: Option<String>,
    pub status: PublicationStatus,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub uri: Option<Option<String>>,
    pub status: Option<PublicationStatus>,
}

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub id: Option<EntityId>,
    pub name: String,
    pub name_localized: Option<String>,
    pub description: Option<String>,
    pub uri: Option<String>,
    pub subject_id: EntityId,
    pub parent_topic_id: Option<EntityId>,
    /// Defaults to after the last sibling
    pub sort_order: Option<i64>,
    pub status: PublicationStatus,
}

impl NewTopic {
    pub fn new(name: impl Into<String>, subject_id: EntityId) -> Self {
        Self {
            id: None,
            name: name.into(),
            name_localized: None,
            description: None,
            uri: None,
            subject_id,
            parent_topic_id: None,
            sort_order: None,
            status: PublicationStatus::Draft,
        }
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent_topic_id = Some(parent);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicPatch {
    pub name: Option<String>,
    pub name_localized: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub uri: Option<Option<String>>,
    /// Moves the topic and its whole subtree to another subject
    pub subject_id: Option<EntityId>,
    pub parent_topic_id: Option<Option<EntityId>>,
    pub sort_order: Option<i64>,
    pub status: Option<PublicationStatus>,
}

#[derive(Debug, Clone)]
pub struct NewOutcome {
    pub id: Option<EntityId>,
    pub text: String,
    pub text_localized: Option<String>,
    pub topic_id: EntityId,
    pub uri: Option<String>,
    pub school_level: Option<String>,
    pub grade: Option<String>,
    pub sort_order: Option<i64>,
    pub status: PublicationStatus,
    pub expects: Vec<EntityId>,
    pub consists_of: Vec<EntityId>,
}

impl NewOutcome {
    pub fn new(text: impl Into<String>, topic_id: EntityId) -> Self {
        Self {
            id: None,
            text: text.into(),
            text_localized: None,
            topic_id,
            uri: None,
            school_level: None,
            grade: None,
            sort_order: None,
            status: PublicationStatus::Draft,
            expects: Vec::new(),
            consists_of: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutcomePatch {
    pub text: Option<String>,
    pub text_localized: Option<Option<String>>,
    pub topic_id: Option<EntityId>,
    pub uri: Option<Option<String>>,
    pub school_level: Option<Option<String>>,
    pub grade: Option<Option<String>>,
    pub sort_order: Option<i64>,
    pub status: Option<PublicationStatus>,
    pub expects: Option<Vec<EntityId>>,
    pub consists_of: Option<Vec<EntityId>>,
}

#[derive(Debug, Clone)]
pub struct NewSkillBit {
    pub id: Option<EntityId>,
    pub label: String,
    pub outcome_id: EntityId,
    /// Defaults to the end of the outcome's list
    pub manual_order: Option<u32>,
}

impl NewSkillBit {
    pub fn new(label: impl Into<String>, outcome_id: EntityId) -> Self {
        Self {
            id: None,
            label: label.into(),
            outcome_id,
            manual_order: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkillBitPatch {
    pub label: Option<String>,
    pub outcome_id: Option<EntityId>,
    pub manual_order: Option<u32>,
}

/// Trims an optional text field, mapping blank values to `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
