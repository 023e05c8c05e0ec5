//! Normalization of the split shape
//!
//! The split collections already carry IDs and references, so this pass
//! only repairs them: missing IDs are allocated, unknown subjects and topics
//! are replaced by fallbacks, invalid parent links are dropped and dangling
//! relation IDs are pruned.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::fallback::Fallbacks;
use super::raw::SplitInput;
use super::{
    clean_text, DroppedRelation, DroppedSkillBit, DuplicateRecord, IngestReport, InputShape,
    Normalized, Reassignment,
};
use crate::domain::hierarchy::assign_parents;
use crate::domain::ordering::renumber_all;
use crate::domain::{
    Dataset, EntityId, EntityKind, IdAllocator, LearningOutcome, PublicationStatus,
    ReferenceTable, SkillBit, Subject, Topic,
};

fn status(raw: Option<&str>, id: &EntityId) -> PublicationStatus {
    match raw.map(str::parse::<PublicationStatus>) {
        None => PublicationStatus::Published,
        Some(Ok(status)) => status,
        Some(Err(message)) => {
            warn!(id = %id, "{}", message);
            PublicationStatus::Published
        }
    }
}

/// Resolves supplied IDs, allocating for blanks and rejecting duplicates
struct IdPass<'a> {
    ids: &'a mut IdAllocator,
    seen: HashSet<(EntityKind, EntityId)>,
    report: &'a mut IngestReport,
}

impl IdPass<'_> {
    fn take(&mut self, kind: EntityKind, supplied: Option<&str>, label: &str, index: usize) -> Option<EntityId> {
        let id = match clean_text(supplied) {
            Some(id) => EntityId::new(id),
            None => self.ids.allocate(kind, label, index),
        };

        if self.seen.insert((kind, id.clone())) {
            Some(id)
        } else {
            warn!(kind = %kind, id = %id, "Skipping record with duplicate ID");
            self.report.duplicates.push(DuplicateRecord { kind, id });
            None
        }
    }
}

/// Repairs a split dataset into canonical form
pub fn normalize_split(input: &SplitInput, now: DateTime<Utc>) -> Normalized {
    let mut report = IngestReport::new(InputShape::Split);
    let mut ids = IdAllocator::new();

    // Supplied IDs must never be handed out to records without one
    let supplied = [
        (EntityKind::Subject, input.subjects.iter().map(|s| s.id.as_deref()).collect::<Vec<_>>()),
        (EntityKind::Topic, input.topics.iter().map(|t| t.id.as_deref()).collect()),
        (EntityKind::LearningOutcome, input.outcomes.iter().map(|o| o.id.as_deref()).collect()),
        (EntityKind::SkillBit, input.skill_bits.iter().map(|s| s.id.as_deref()).collect()),
    ];
    for (kind, list) in &supplied {
        for id in list.iter().filter_map(|id| clean_text(*id)) {
            ids.reserve(*kind, &EntityId::new(id));
        }
    }

    let mut fallbacks = Fallbacks::new(now);
    let mut pass = IdPass {
        ids: &mut ids,
        seen: HashSet::new(),
        report: &mut report,
    };

    let mut subjects = Vec::with_capacity(input.subjects.len());
    for (index, raw) in input.subjects.iter().enumerate() {
        let title = clean_text(raw.title.as_deref()).unwrap_or_default();
        let Some(id) = pass.take(EntityKind::Subject, raw.id.as_deref(), &title, index) else {
            continue;
        };

        let created = raw.created_at.unwrap_or(now);
        let mut subject = Subject::new(id, title, created);
        subject.description = clean_text(raw.description.as_deref());
        subject.uri = clean_text(raw.uri.as_deref());
        subject.status = status(raw.status.as_deref(), &subject.id);
        subject.updated_at = raw.updated_at.unwrap_or(created);
        subjects.push(subject);
    }
    let subject_ids: HashSet<EntityId> = subjects.iter().map(|s| s.id.clone()).collect();

    let mut topics = Vec::with_capacity(input.topics.len());
    let mut candidates: Vec<Vec<String>> = Vec::with_capacity(input.topics.len());
    for (index, raw) in input.topics.iter().enumerate() {
        let name = clean_text(raw.name.as_deref()).unwrap_or_default();
        let Some(id) = pass.take(EntityKind::Topic, raw.id.as_deref(), &name, index) else {
            continue;
        };

        let wanted = clean_text(raw.subject_id.as_deref());
        let known = wanted.as_deref().filter(|s| subject_ids.contains(*s)).map(EntityId::new);
        let subject_id = match known {
            Some(subject_id) => subject_id,
            None => {
                let fallback = fallbacks.subject(pass.ids);
                warn!(topic = %id, subject = ?wanted, "Unknown subject; using fallback");
                pass.report.reassigned.push(Reassignment {
                    kind: EntityKind::Topic,
                    id: id.clone(),
                    missing: wanted,
                    assigned_to: fallback.clone(),
                });
                fallback
            }
        };

        let created = raw.created_at.unwrap_or(now);
        let mut topic = Topic::new(id, name, subject_id, created);
        topic.name_localized = clean_text(raw.name_localized.as_deref());
        topic.description = clean_text(raw.description.as_deref());
        topic.uri = clean_text(raw.uri.as_deref());
        topic.sort_order = raw.sort_order.unwrap_or(index as i64);
        topic.status = status(raw.status.as_deref(), &topic.id);
        topic.updated_at = raw.updated_at.unwrap_or(created);

        candidates.push(clean_text(raw.parent_topic_id.as_deref()).into_iter().collect());
        topics.push(topic);
    }

    // Parent references are IDs here, so the lookup holds IDs only
    let mut by_id = ReferenceTable::new();
    for topic in &topics {
        by_id.register(topic.id.as_str(), &topic.id);
    }
    let unplaced = assign_parents(&mut topics, &candidates, &by_id);
    for rejected in &unplaced {
        warn!(topic = %rejected.topic, references = ?rejected.references, "Dropping invalid parent link");
    }
    pass.report.rejected_parents = unplaced;
    let topic_ids: HashSet<EntityId> = topics.iter().map(|t| t.id.clone()).collect();

    let mut outcomes = Vec::with_capacity(input.outcomes.len());
    let mut relations = Vec::with_capacity(input.outcomes.len());
    for (index, raw) in input.outcomes.iter().enumerate() {
        let text = clean_text(raw.text.as_deref()).unwrap_or_default();
        let Some(id) = pass.take(EntityKind::LearningOutcome, raw.id.as_deref(), &text, index) else {
            continue;
        };

        let wanted = clean_text(raw.topic_id.as_deref());
        let known = wanted.as_deref().filter(|t| topic_ids.contains(*t)).map(EntityId::new);
        let topic_id = match known {
            Some(topic_id) => topic_id,
            None => {
                let subject = fallbacks.subject(pass.ids);
                let fallback = fallbacks.topic_for(&subject, pass.ids);
                warn!(outcome = %id, topic = ?wanted, "Unknown topic; using fallback");
                pass.report.reassigned.push(Reassignment {
                    kind: EntityKind::LearningOutcome,
                    id: id.clone(),
                    missing: wanted,
                    assigned_to: fallback.clone(),
                });
                fallback
            }
        };

        let created = raw.created_at.unwrap_or(now);
        let mut outcome = LearningOutcome::new(id, text, topic_id, created);
        outcome.text_localized = clean_text(raw.text_localized.as_deref());
        outcome.uri = clean_text(raw.uri.as_deref());
        outcome.school_level = clean_text(raw.school_level.as_deref());
        outcome.grade = clean_text(raw.grade.as_deref());
        outcome.sort_order = raw.sort_order.unwrap_or(index as i64);
        outcome.status = status(raw.status.as_deref(), &outcome.id);
        outcome.updated_at = raw.updated_at.unwrap_or(created);

        relations.push((&raw.expects, &raw.consists_of));
        outcomes.push(outcome);
    }

    let outcome_ids: HashSet<EntityId> = outcomes.iter().map(|o| o.id.clone()).collect();
    for (outcome, (expects, consists_of)) in outcomes.iter_mut().zip(relations) {
        outcome.expects = prune(&outcome.id, expects.cleaned(), &outcome_ids, pass.report);
        outcome.consists_of = prune(&outcome.id, consists_of.cleaned(), &outcome_ids, pass.report);
    }

    let mut skill_bits = Vec::with_capacity(input.skill_bits.len());
    for (index, raw) in input.skill_bits.iter().enumerate() {
        let label = clean_text(raw.label.as_deref()).unwrap_or_default();
        let owner = clean_text(raw.outcome_id.as_deref());

        let known = owner.as_deref().filter(|o| outcome_ids.contains(*o)).map(EntityId::new);
        let outcome_id = match known {
            Some(outcome_id) => outcome_id,
            None => {
                warn!(label = %label, outcome = ?owner, "Dropping skill-bit with unknown outcome");
                pass.report.dropped_skill_bits.push(DroppedSkillBit {
                    label,
                    reference: owner,
                });
                continue;
            }
        };

        let Some(id) = pass.take(EntityKind::SkillBit, raw.id.as_deref(), &label, index) else {
            continue;
        };

        let order = raw.manual_order.unwrap_or(u32::MAX);
        let created = raw.created_at.unwrap_or(now);
        let mut bit = SkillBit::new(id, label, outcome_id, order, created);
        bit.updated_at = raw.updated_at.unwrap_or(created);
        skill_bits.push(bit);
    }
    renumber_all(&mut skill_bits);

    report.fallback_subject = fallbacks.subject_id().cloned();
    let (fallback_subject, fallback_topics) = fallbacks.into_parts();
    subjects.extend(fallback_subject);
    topics.extend(fallback_topics);

    debug!(
        subjects = subjects.len(),
        topics = topics.len(),
        outcomes = outcomes.len(),
        skill_bits = skill_bits.len(),
        "Normalized split dataset"
    );

    Normalized {
        dataset: Dataset::new(subjects, topics, outcomes, skill_bits),
        report,
    }
}

fn prune<'r>(
    owner: &EntityId,
    references: impl Iterator<Item = &'r str>,
    known: &HashSet<EntityId>,
    report: &mut IngestReport,
) -> Vec<EntityId> {
    let mut kept: Vec<EntityId> = Vec::new();
    for reference in references {
        if reference == owner.as_str() || kept.iter().any(|k| k.as_str() == reference) {
            continue;
        }
        if known.contains(reference) {
            kept.push(EntityId::new(reference));
        } else {
            debug!(outcome = %owner, reference, "Pruning dangling relation");
            report.dropped_relations.push(DroppedRelation {
                outcome: owner.clone(),
                reference: reference.to_string(),
            });
        }
    }
    kept
}
