//! The canonical dataset
//!
//! Four collections held behind `Arc`s. Readers clone the `Dataset` cheaply
//! and keep a consistent snapshot; writers build a new `Vec` and swap the
//! `Arc`, never mutating a collection another reader may hold.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entity::{display_order, LearningOutcome, SkillBit, Subject, Topic};
use super::id::{EntityId, EntityKind};
use super::ordering::sibling_order;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    subjects: Arc<Vec<Subject>>,
    topics: Arc<Vec<Topic>>,
    learning_outcomes: Arc<Vec<LearningOutcome>>,
    skill_bits: Arc<Vec<SkillBit>>,
}

/// Entity totals, for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetCounts {
    pub subjects: usize,
    pub topics: usize,
    pub learning_outcomes: usize,
    pub skill_bits: usize,
}

/// A breach of the dataset's referential or ordering invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("{kind} ID {id} is used more than once")]
    DuplicateId { kind: EntityKind, id: EntityId },

    #[error("Topic {topic} references missing subject {subject}")]
    MissingSubject { topic: EntityId, subject: EntityId },

    #[error("Topic {topic} references missing parent {parent}")]
    MissingParent { topic: EntityId, parent: EntityId },

    #[error("Topic {topic} has parent {parent} in another subject")]
    CrossSubjectParent { topic: EntityId, parent: EntityId },

    #[error("Topic {0} is its own ancestor")]
    TopicCycle(EntityId),

    #[error("Learning outcome {outcome} references missing topic {topic}")]
    MissingTopic { outcome: EntityId, topic: EntityId },

    #[error("Learning outcome {outcome} relates to missing outcome {target}")]
    DanglingRelation { outcome: EntityId, target: EntityId },

    #[error("Skill-bit {skill_bit} references missing outcome {outcome}")]
    MissingOutcome { skill_bit: EntityId, outcome: EntityId },

    #[error("Skill-bits of {0} are not numbered 1..N")]
    SparseOrder(EntityId),
}

fn sort_skill_bits(skill_bits: &mut [SkillBit]) {
    skill_bits.sort_by(|a, b| a.outcome_id.cmp(&b.outcome_id).then_with(|| sibling_order(a, b)));
}

impl Dataset {
    /// Builds a dataset, applying the canonical collection ordering
    pub fn new(
        subjects: Vec<Subject>,
        topics: Vec<Topic>,
        learning_outcomes: Vec<LearningOutcome>,
        skill_bits: Vec<SkillBit>,
    ) -> Self {
        let mut dataset = Self::default();
        dataset.set_subjects(subjects);
        dataset.set_topics(topics);
        dataset.set_outcomes(learning_outcomes);
        dataset.set_skill_bits(skill_bits);
        dataset
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn outcomes(&self) -> &[LearningOutcome] {
        &self.learning_outcomes
    }

    pub fn skill_bits(&self) -> &[SkillBit] {
        &self.skill_bits
    }

    /// Replaces the subject collection
    pub fn set_subjects(&mut self, subjects: Vec<Subject>) {
        self.subjects = Arc::new(subjects);
    }

    /// Replaces the topic collection, re-sorting it
    pub fn set_topics(&mut self, mut topics: Vec<Topic>) {
        topics.sort_by(display_order);
        self.topics = Arc::new(topics);
    }

    /// Replaces the outcome collection, re-sorting it
    pub fn set_outcomes(&mut self, mut outcomes: Vec<LearningOutcome>) {
        outcomes.sort_by(display_order);
        self.learning_outcomes = Arc::new(outcomes);
    }

    /// Replaces the skill-bit collection, re-sorting it
    pub fn set_skill_bits(&mut self, mut skill_bits: Vec<SkillBit>) {
        sort_skill_bits(&mut skill_bits);
        self.skill_bits = Arc::new(skill_bits);
    }

    /// Shared handle to the topic collection; stays valid across mutations
    pub fn topics_handle(&self) -> Arc<Vec<Topic>> {
        Arc::clone(&self.topics)
    }

    pub fn subject(&self, id: &EntityId) -> Option<&Subject> {
        self.subjects.iter().find(|s| &s.id == id)
    }

    pub fn topic(&self, id: &EntityId) -> Option<&Topic> {
        self.topics.iter().find(|t| &t.id == id)
    }

    pub fn outcome(&self, id: &EntityId) -> Option<&LearningOutcome> {
        self.learning_outcomes.iter().find(|o| &o.id == id)
    }

    pub fn skill_bit(&self, id: &EntityId) -> Option<&SkillBit> {
        self.skill_bits.iter().find(|s| &s.id == id)
    }

    /// Topics of a subject, in display order
    pub fn topics_for_subject(&self, subject: &EntityId) -> impl Iterator<Item = &Topic> + '_ {
        let subject = subject.clone();
        self.topics.iter().filter(move |t| t.subject_id == subject)
    }

    /// Outcomes of a topic, in display order
    pub fn outcomes_for_topic(
        &self,
        topic: &EntityId,
    ) -> impl Iterator<Item = &LearningOutcome> + '_ {
        let topic = topic.clone();
        self.learning_outcomes.iter().filter(move |o| o.topic_id == topic)
    }

    /// Skill-bits of an outcome, in manual order
    pub fn skill_bits_for_outcome(&self, outcome: &EntityId) -> impl Iterator<Item = &SkillBit> + '_ {
        let outcome = outcome.clone();
        self.skill_bits.iter().filter(move |s| s.outcome_id == outcome)
    }

    pub fn skill_bit_count(&self, outcome: &EntityId) -> usize {
        self.skill_bits_for_outcome(outcome).count()
    }

    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            subjects: self.subjects.len(),
            topics: self.topics.len(),
            learning_outcomes: self.learning_outcomes.len(),
            skill_bits: self.skill_bits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts() == DatasetCounts::default()
    }

    /// Lists every invariant breach; empty for a canonical dataset
    pub fn violations(&self) -> Vec<Violation> {
        let mut found = Vec::new();

        duplicates(EntityKind::Subject, self.subjects.iter().map(|s| &s.id), &mut found);
        duplicates(EntityKind::Topic, self.topics.iter().map(|t| &t.id), &mut found);
        duplicates(
            EntityKind::LearningOutcome,
            self.learning_outcomes.iter().map(|o| &o.id),
            &mut found,
        );
        duplicates(EntityKind::SkillBit, self.skill_bits.iter().map(|s| &s.id), &mut found);

        let subjects: HashSet<&EntityId> = self.subjects.iter().map(|s| &s.id).collect();
        let topics: HashMap<&EntityId, &Topic> = self.topics.iter().map(|t| (&t.id, t)).collect();
        let outcomes: HashSet<&EntityId> = self.learning_outcomes.iter().map(|o| &o.id).collect();

        for topic in self.topics.iter() {
            if !subjects.contains(&topic.subject_id) {
                found.push(Violation::MissingSubject {
                    topic: topic.id.clone(),
                    subject: topic.subject_id.clone(),
                });
            }

            if let Some(parent_id) = &topic.parent_topic_id {
                match topics.get(parent_id) {
                    None => found.push(Violation::MissingParent {
                        topic: topic.id.clone(),
                        parent: parent_id.clone(),
                    }),
                    Some(parent) if parent.subject_id != topic.subject_id => {
                        found.push(Violation::CrossSubjectParent {
                            topic: topic.id.clone(),
                            parent: parent_id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }

            let mut seen = HashSet::from([&topic.id]);
            let mut current = topic.parent_topic_id.as_ref();
            while let Some(id) = current {
                if !seen.insert(id) {
                    found.push(Violation::TopicCycle(topic.id.clone()));
                    break;
                }
                current = topics.get(id).and_then(|t| t.parent_topic_id.as_ref());
            }
        }

        for outcome in self.learning_outcomes.iter() {
            if !topics.contains_key(&outcome.topic_id) {
                found.push(Violation::MissingTopic {
                    outcome: outcome.id.clone(),
                    topic: outcome.topic_id.clone(),
                });
            }
            for target in outcome.expects.iter().chain(&outcome.consists_of) {
                if !outcomes.contains(target) {
                    found.push(Violation::DanglingRelation {
                        outcome: outcome.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        let mut groups: HashMap<&EntityId, Vec<u32>> = HashMap::new();
        for bit in self.skill_bits.iter() {
            if !outcomes.contains(&bit.outcome_id) {
                found.push(Violation::MissingOutcome {
                    skill_bit: bit.id.clone(),
                    outcome: bit.outcome_id.clone(),
                });
            }
            groups.entry(&bit.outcome_id).or_default().push(bit.manual_order);
        }

        let mut sparse: Vec<&EntityId> = groups
            .into_iter()
            .filter_map(|(outcome, mut orders)| {
                orders.sort_unstable();
                let dense = orders.iter().enumerate().all(|(i, &o)| o as usize == i + 1);
                (!dense).then_some(outcome)
            })
            .collect();
        sparse.sort();
        found.extend(sparse.into_iter().map(|o| Violation::SparseOrder(o.clone())));

        found
    }
}

fn duplicates<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a EntityId>,
    found: &mut Vec<Violation>,
) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            found.push(Violation::DuplicateId {
                kind,
                id: id.clone(),
            });
        }
    }
}
