use chrono::Utc;

use super::error::required_text;
use super::input::{optional_text, NewTopic, TopicPatch};
use super::{assign_id, CurriculumStore, Removal, StoreError};
use crate::domain::hierarchy::{build_tree, collect_descendant_ids, flatten_with_depth, validate_parent};
use crate::domain::{EntityId, EntityKind, Topic, TopicNode};

/// Order hint that places a topic after its current siblings
fn next_sort_order(topics: &[Topic], subject: &EntityId, parent: Option<&EntityId>) -> i64 {
    topics
        .iter()
        .filter(|t| &t.subject_id == subject && t.parent_topic_id.as_ref() == parent)
        .map(|t| t.sort_order)
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

impl CurriculumStore {
    pub fn topics(&self) -> &[Topic] {
        self.current.topics()
    }

    pub fn topic(&self, id: &EntityId) -> Result<&Topic, StoreError> {
        self.current
            .topic(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, id))
    }

    /// Topic forest of one subject
    pub fn topic_tree(&self, subject: &EntityId) -> Result<Vec<TopicNode<'_>>, StoreError> {
        self.subject(subject)?;
        Ok(build_tree(
            self.current
                .topics()
                .iter()
                .filter(|t| &t.subject_id == subject),
        ))
    }

    /// Pre-order listing of a subject's topics with their depth
    pub fn topics_with_depth(&self, subject: &EntityId) -> Result<Vec<(&Topic, usize)>, StoreError> {
        Ok(flatten_with_depth(&self.topic_tree(subject)?))
    }

    pub fn create_topic(&mut self, input: NewTopic) -> Result<Topic, StoreError> {
        let name = required_text("name", &input.name)?;
        self.current
            .subject(&input.subject_id)
            .ok_or_else(|| StoreError::missing(EntityKind::Subject, &input.subject_id))?;

        let id = assign_id(
            EntityKind::Topic,
            input.id,
            &name,
            self.current.topics().iter().map(|t| &t.id),
        )?;

        if let Some(parent) = &input.parent_topic_id {
            validate_parent(self.current.topics(), &id, &input.subject_id, parent)?;
        }

        let sort_order = input.sort_order.unwrap_or_else(|| {
            next_sort_order(
                self.current.topics(),
                &input.subject_id,
                input.parent_topic_id.as_ref(),
            )
        });

        let mut topic = Topic::new(id, name, input.subject_id, Utc::now());
        topic.name_localized = optional_text(input.name_localized);
        topic.description = optional_text(input.description);
        topic.uri = optional_text(input.uri);
        topic.parent_topic_id = input.parent_topic_id;
        topic.sort_order = sort_order;
        topic.status = input.status;

        let mut topics = self.current.topics().to_vec();
        topics.push(topic.clone());

        let mut next = self.current.clone();
        next.set_topics(topics);
        self.commit(next, "create topic");

        Ok(topic)
    }

    /// Updates a topic
    ///
    /// A subject change moves the whole subtree. Parent and subject changes
    /// are checked against the stored tree; a rejected change leaves the
    /// dataset untouched.
    pub fn update_topic(&mut self, id: &EntityId, patch: TopicPatch) -> Result<Topic, StoreError> {
        let current = self.topic(id)?.clone();
        let now = Utc::now();
        let mut topics = self.current.topics().to_vec();

        let subject = patch.subject_id.unwrap_or_else(|| current.subject_id.clone());
        let moved = subject != current.subject_id;
        if moved {
            self.current
                .subject(&subject)
                .ok_or_else(|| StoreError::missing(EntityKind::Subject, &subject))?;

            let subtree = collect_descendant_ids(&topics, id);
            for topic in topics.iter_mut().filter(|t| subtree.contains(&t.id)) {
                topic.subject_id = subject.clone();
                topic.touch(now);
            }
        }

        let reparented = patch.parent_topic_id.is_some();
        let parent = patch
            .parent_topic_id
            .unwrap_or_else(|| current.parent_topic_id.clone());
        if let Some(parent) = &parent {
            if moved || reparented {
                validate_parent(&topics, id, &subject, parent)?;
            }
        }

        let topic = topics
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Topic, id))?;

        if let Some(name) = patch.name {
            topic.name = required_text("name", &name)?;
        }
        if let Some(localized) = patch.name_localized {
            topic.name_localized = optional_text(localized);
        }
        if let Some(description) = patch.description {
            topic.description = optional_text(description);
        }
        if let Some(uri) = patch.uri {
            topic.uri = optional_text(uri);
        }
        if let Some(order) = patch.sort_order {
            topic.sort_order = order;
        }
        if let Some(status) = patch.status {
            topic.status = status;
        }
        topic.subject_id = subject;
        topic.parent_topic_id = parent;
        topic.touch(now);
        let updated = topic.clone();

        let mut next = self.current.clone();
        next.set_topics(topics);
        self.commit(next, "update topic");

        Ok(updated)
    }

    /// Deletes a topic with its descendants, their outcomes and skill-bits
    pub fn delete_topic(&mut self, id: &EntityId) -> Result<Removal, StoreError> {
        self.topic(id)?;

        let removal = Removal::cascade(&self.current, &[], std::slice::from_ref(id), &[], &[]);
        let next = removal.apply(&self.current, Utc::now());
        self.commit(next, "delete topic");

        Ok(removal)
    }
}
