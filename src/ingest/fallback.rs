//! Fallback owners for records with unresolvable references

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::{EntityId, EntityKind, IdAllocator, PublicationStatus, Subject, Topic};

pub(crate) const UNSPECIFIED: &str = "Unspecified";

/// Fallback topics sort after every real sibling
const UNSPECIFIED_ORDER: i64 = i64::MAX;

/// Lazily created "Unspecified" subject and per-subject "Unspecified" topics
///
/// The subject's label is never registered for lookup, so a real subject
/// called "Unspecified" in the input stays distinct from it.
#[derive(Debug)]
pub(crate) struct Fallbacks {
    now: DateTime<Utc>,
    subject: Option<Subject>,
    topics: HashMap<EntityId, Topic>,
    topic_order: Vec<EntityId>,
}

impl Fallbacks {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            subject: None,
            topics: HashMap::new(),
            topic_order: Vec::new(),
        }
    }

    /// ID of the fallback subject, creating it on first use
    pub fn subject(&mut self, ids: &mut IdAllocator) -> EntityId {
        let now = self.now;
        self.subject
            .get_or_insert_with(|| {
                let id = ids.allocate(EntityKind::Subject, UNSPECIFIED, 0);
                tracing::warn!(subject = %id, "Creating fallback subject for unresolved references");
                let mut subject = Subject::new(id, UNSPECIFIED, now);
                subject.status = PublicationStatus::Draft;
                subject
            })
            .id
            .clone()
    }

    pub fn subject_id(&self) -> Option<&EntityId> {
        self.subject.as_ref().map(|s| &s.id)
    }

    /// ID of the draft "Unspecified" topic under `subject`, creating it on first use
    pub fn topic_for(&mut self, subject: &EntityId, ids: &mut IdAllocator) -> EntityId {
        if let Some(topic) = self.topics.get(subject) {
            return topic.id.clone();
        }

        let id = ids.allocate(EntityKind::Topic, UNSPECIFIED, self.topic_order.len());
        tracing::debug!(topic = %id, subject = %subject, "Creating fallback topic");
        let mut topic = Topic::new(id.clone(), UNSPECIFIED, subject.clone(), self.now);
        topic.sort_order = UNSPECIFIED_ORDER;
        topic.status = PublicationStatus::Draft;

        self.topics.insert(subject.clone(), topic);
        self.topic_order.push(subject.clone());
        id
    }

    /// Created entities, topics in creation order
    pub fn into_parts(mut self) -> (Option<Subject>, Vec<Topic>) {
        let topics = self
            .topic_order
            .iter()
            .filter_map(|subject| self.topics.remove(subject))
            .collect();
        (self.subject, topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_is_created_once() {
        let mut ids = IdAllocator::new();
        let mut fallbacks = Fallbacks::new(Utc::now());

        let first = fallbacks.subject(&mut ids);
        let second = fallbacks.subject(&mut ids);

        assert_eq!(first, second);
        assert_eq!(first.as_str(), "unspecified");
        let (subject, topics) = fallbacks.into_parts();
        assert_eq!(subject.map(|s| s.status), Some(PublicationStatus::Draft));
        assert!(topics.is_empty());
    }

    #[test]
    fn one_topic_per_subject() {
        let mut ids = IdAllocator::new();
        let mut fallbacks = Fallbacks::new(Utc::now());
        let math = EntityId::new("math");
        let art = EntityId::new("art");

        let a = fallbacks.topic_for(&math, &mut ids);
        let b = fallbacks.topic_for(&art, &mut ids);
        let c = fallbacks.topic_for(&math, &mut ids);

        assert_eq!(a, c);
        assert_ne!(a, b);
        let (subject, topics) = fallbacks.into_parts();
        assert!(subject.is_none());
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].subject_id, math);
        assert_eq!(topics[1].subject_id, art);
    }
}
