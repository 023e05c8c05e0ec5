//! Normalization of the combined shape
//!
//! The combined document carries no identifiers at all. Entities are
//! synthesized in dependency order:
//!
//! 1. subjects from every subject name mentioned anywhere
//! 2. topics, then their parent links through the hierarchy builder
//! 3. outcomes, then (second pass) their relation references
//! 4. skill-bits, kept only when their outcome resolves
//!
//! Each step registers what it created so later steps can resolve labels
//! and URLs to IDs.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::fallback::Fallbacks;
use super::raw::{CombinedInput, CombinedOutcome};
use super::{
    clean_text, DroppedRelation, DroppedSkillBit, IngestReport, InputShape, Normalized,
};
use crate::domain::hierarchy::assign_parents;
use crate::domain::ordering::renumber_all;
use crate::domain::{
    Dataset, EntityId, EntityKind, IdAllocator, LearningOutcome, PublicationStatus,
    ReferenceTable, SkillBit, Subject, Topic,
};

/// Outcome created in the first pass, relation references still unresolved
struct PendingOutcome<'a> {
    outcome: LearningOutcome,
    raw: &'a CombinedOutcome,
}

struct Synthesis {
    now: DateTime<Utc>,
    ids: IdAllocator,
    fallbacks: Fallbacks,
    subject_refs: ReferenceTable,
    topic_refs: ReferenceTable,
    outcome_refs: ReferenceTable,
    subjects: Vec<Subject>,
    topics: Vec<Topic>,
    report: IngestReport,
}

impl Synthesis {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            ids: IdAllocator::new(),
            fallbacks: Fallbacks::new(now),
            subject_refs: ReferenceTable::new(),
            topic_refs: ReferenceTable::new(),
            outcome_refs: ReferenceTable::new(),
            subjects: Vec::new(),
            topics: Vec::new(),
            report: IngestReport::new(InputShape::Combined),
        }
    }

    fn subjects(&mut self, input: &CombinedInput) {
        let names = input
            .subjects
            .iter()
            .map(String::as_str)
            .chain(input.topics.iter().flat_map(|t| t.subject.iter()))
            .chain(input.learning_outcomes.iter().flat_map(|o| o.subject.iter()));

        for name in names {
            let Some(title) = clean_text(Some(name)) else {
                continue;
            };
            if self.subject_refs.resolve_label(&title).is_some() {
                continue;
            }

            let id = self
                .ids
                .allocate(EntityKind::Subject, &title, self.subjects.len());
            self.subject_refs.register_entity(&id, name, None);
            let mut subject = Subject::new(id, title, self.now);
            subject.status = PublicationStatus::Published;
            self.subjects.push(subject);
        }
    }

    /// Resolves the first subject reference, or the fallback subject
    fn subject_for<'r>(&mut self, references: impl IntoIterator<Item = &'r str>) -> EntityId {
        match self.subject_refs.resolve_first(references) {
            Some(id) => id.clone(),
            None => self.fallbacks.subject(&mut self.ids),
        }
    }

    fn topics(&mut self, input: &CombinedInput) {
        let mut candidates = Vec::with_capacity(input.topics.len());

        for (index, raw) in input.topics.iter().enumerate() {
            let label = raw.text.as_deref().unwrap_or_default();
            let name = clean_text(Some(label)).unwrap_or_default();
            let id = self.ids.allocate(EntityKind::Topic, &name, index);
            let subject_id = self.subject_for(raw.subject.iter());

            self.topic_refs
                .register_entity(&id, label, raw.url.as_deref());

            let mut topic = Topic::new(id, name, subject_id, self.now);
            topic.name_localized = clean_text(raw.text_localized.as_deref());
            topic.description = clean_text(raw.description.as_deref());
            topic.uri = clean_text(raw.url.as_deref());
            topic.sort_order = raw.order.unwrap_or(index as i64);
            topic.status = PublicationStatus::Published;

            candidates.push(raw.parent.0.clone());
            self.topics.push(topic);
        }

        let unplaced = assign_parents(&mut self.topics, &candidates, &self.topic_refs);
        for rejected in &unplaced {
            warn!(
                topic = %rejected.topic,
                references = ?rejected.references,
                "No acceptable parent; topic becomes a root"
            );
        }
        self.report.rejected_parents = unplaced;
    }

    /// Resolves an outcome's topic, synthesizing one when the name is unknown
    fn topic_for(&mut self, raw: &CombinedOutcome) -> EntityId {
        if let Some(id) = self.topic_refs.resolve_first(raw.topic.iter()) {
            return id.clone();
        }

        let subject_id = self.subject_for(raw.subject.iter());

        let Some(name) = raw.topic.first().map(str::to_string) else {
            return self.fallbacks.topic_for(&subject_id, &mut self.ids);
        };

        let id = self
            .ids
            .allocate(EntityKind::Topic, &name, self.topics.len());
        warn!(topic = %id, name = %name, "Synthesizing draft topic referenced by outcome");
        self.topic_refs.register_entity(&id, &name, None);

        let mut topic = Topic::new(id.clone(), name, subject_id, self.now);
        topic.sort_order = self.topics.len() as i64;
        self.topics.push(topic);
        self.report.synthesized_topics.push(id.clone());
        id
    }

    fn outcomes<'a>(&mut self, input: &'a CombinedInput) -> Vec<PendingOutcome<'a>> {
        let mut pending = Vec::with_capacity(input.learning_outcomes.len());

        for (index, raw) in input.learning_outcomes.iter().enumerate() {
            let label = raw.text.as_deref().unwrap_or_default();
            let text = clean_text(Some(label)).unwrap_or_default();
            let id = self.ids.allocate(EntityKind::LearningOutcome, &text, index);
            let topic_id = self.topic_for(raw);

            self.outcome_refs
                .register_entity(&id, label, raw.url.as_deref());

            let mut outcome = LearningOutcome::new(id, text, topic_id, self.now);
            outcome.text_localized = clean_text(raw.text_localized.as_deref());
            outcome.uri = clean_text(raw.url.as_deref());
            outcome.school_level = clean_text(raw.school_level.as_deref());
            outcome.grade = clean_text(raw.grade.as_deref());
            outcome.sort_order = raw.order.unwrap_or(index as i64);
            outcome.status = PublicationStatus::Published;

            pending.push(PendingOutcome { outcome, raw });
        }

        pending
    }

    /// Second pass: every outcome is registered, so references can resolve
    fn resolve_relations(&mut self, pending: Vec<PendingOutcome<'_>>) -> Vec<LearningOutcome> {
        pending
            .into_iter()
            .map(|PendingOutcome { mut outcome, raw }| {
                outcome.expects = self.resolve_list(&outcome.id, raw.expects.iter());
                outcome.consists_of = self.resolve_list(&outcome.id, raw.consists_of.iter());
                outcome
            })
            .collect()
    }

    fn resolve_list<'r>(
        &mut self,
        owner: &EntityId,
        references: impl Iterator<Item = &'r str>,
    ) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for reference in references {
            if reference.trim().is_empty() {
                continue;
            }
            match self.outcome_refs.resolve(reference) {
                Some(id) if id != owner => {
                    if seen.insert(id.clone()) {
                        resolved.push(id.clone());
                    }
                }
                Some(_) => {}
                None => {
                    debug!(outcome = %owner, reference, "Dropping unresolved relation");
                    self.report.dropped_relations.push(DroppedRelation {
                        outcome: owner.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }

        resolved
    }

    fn skill_bits(&mut self, input: &CombinedInput, outcomes: &[LearningOutcome]) -> Vec<SkillBit> {
        let mut skill_bits: Vec<SkillBit> = Vec::new();

        for (index, raw) in input.skill_bits.iter().enumerate() {
            let label = clean_text(raw.text.as_deref()).unwrap_or_default();

            let owner = self
                .outcome_refs
                .resolve_first(raw.outcome.iter())
                .cloned()
                .or_else(|| raw.outcome.cleaned().find_map(|r| outcome_by_uri(outcomes, r)));

            let Some(outcome_id) = owner else {
                let reference = raw.outcome.first().map(str::to_string);
                warn!(label = %label, reference = ?reference, "Dropping skill-bit with unknown outcome");
                self.report
                    .dropped_skill_bits
                    .push(DroppedSkillBit { label, reference });
                continue;
            };

            let id = self.ids.allocate(EntityKind::SkillBit, &label, index);
            let order = raw.order.unwrap_or_else(|| {
                skill_bits.iter().filter(|s| s.outcome_id == outcome_id).count() as u32 + 1
            });
            skill_bits.push(SkillBit::new(id, label, outcome_id, order, self.now));
        }

        renumber_all(&mut skill_bits);
        skill_bits
    }

    fn finish(self, outcomes: Vec<LearningOutcome>, skill_bits: Vec<SkillBit>) -> Normalized {
        let Synthesis {
            fallbacks,
            mut subjects,
            mut topics,
            mut report,
            ..
        } = self;

        report.fallback_subject = fallbacks.subject_id().cloned();
        let (fallback_subject, fallback_topics) = fallbacks.into_parts();
        subjects.extend(fallback_subject);
        topics.extend(fallback_topics);

        Normalized {
            dataset: Dataset::new(subjects, topics, outcomes, skill_bits),
            report,
        }
    }
}

fn canonical_uri(uri: &str) -> String {
    uri.trim().trim_end_matches('/').to_lowercase()
}

fn outcome_by_uri(outcomes: &[LearningOutcome], reference: &str) -> Option<EntityId> {
    let wanted = canonical_uri(reference);
    outcomes
        .iter()
        .find(|o| o.uri.as_deref().map(canonical_uri).as_deref() == Some(wanted.as_str()))
        .map(|o| o.id.clone())
}

/// Synthesizes a canonical dataset from the combined shape
pub fn normalize_combined(input: &CombinedInput, now: DateTime<Utc>) -> Normalized {
    let mut synthesis = Synthesis::new(now);

    synthesis.subjects(input);
    synthesis.topics(input);
    let pending = synthesis.outcomes(input);
    let outcomes = synthesis.resolve_relations(pending);
    let skill_bits = synthesis.skill_bits(input, &outcomes);

    debug!(
        subjects = synthesis.subjects.len(),
        topics = synthesis.topics.len(),
        outcomes = outcomes.len(),
        skill_bits = skill_bits.len(),
        "Normalized combined dataset"
    );

    synthesis.finish(outcomes, skill_bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CombinedInput {
        CombinedInput::from_json(json).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn minimal_document() {
        let input = parse(
            r#"{
                "subjects": ["Math"],
                "topics": [{"text": "Algebra", "subject": ["Math"]}],
                "learning_outcomes": [
                    {"text": "Solve linear equations", "subject": ["Math"], "topic": ["Algebra"]}
                ]
            }"#,
        );

        let Normalized { dataset, report } = normalize_combined(&input, now());

        assert_eq!(dataset.subjects().len(), 1);
        assert_eq!(dataset.subjects()[0].title, "Math");
        assert_eq!(dataset.topics().len(), 1);
        let topic = &dataset.topics()[0];
        assert_eq!(topic.name, "Algebra");
        assert_eq!(topic.subject_id, dataset.subjects()[0].id);
        assert_eq!(dataset.outcomes().len(), 1);
        assert_eq!(dataset.outcomes()[0].topic_id, topic.id);
        assert!(dataset.skill_bits().is_empty());
        assert!(report.is_clean());
        assert!(dataset.violations().is_empty());
    }

    #[test]
    fn subjects_come_from_every_mention() {
        let input = parse(
            r#"{
                "subjects": ["Math"],
                "topics": [{"text": "Painting", "subject": "Art"}],
                "learning_outcomes": [{"text": "Sing", "subject": ["Music"], "topic": "Songs"}]
            }"#,
        );

        let dataset = normalize_combined(&input, now()).dataset;
        let titles: Vec<_> = dataset.subjects().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Math", "Art", "Music"]);
    }

    #[test]
    fn subject_names_differing_in_case_stay_distinct() {
        let input = parse(r#"{"subjects": ["Math", "math"]}"#);

        let dataset = normalize_combined(&input, now()).dataset;
        let titles: Vec<_> = dataset.subjects().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Math", "math"]);
        assert_ne!(dataset.subjects()[0].id, dataset.subjects()[1].id);
    }

    #[test]
    fn exact_topic_label_wins_over_matching_slug() {
        let input = parse(
            r#"{
                "subjects": ["Math", "Art"],
                "topics": [
                    {"text": "Algebra", "subject": "Math"},
                    {"text": "algebra", "subject": "Art"}
                ],
                "learning_outcomes": [{"text": "Draw symbols", "subject": "Art", "topic": "algebra"}]
            }"#,
        );

        let Normalized { dataset, report } = normalize_combined(&input, now());

        assert_eq!(dataset.topics().len(), 2);
        let outcome = &dataset.outcomes()[0];
        let topic = dataset.topic(&outcome.topic_id).unwrap();
        assert_eq!(topic.name, "algebra");
        assert_eq!(topic.subject_id.as_str(), "art");
        assert!(report.synthesized_topics.is_empty());
    }

    #[test]
    fn parents_resolve_and_cycles_are_rejected() {
        let input = parse(
            r#"{
                "subjects": ["Math", "Art"],
                "topics": [
                    {"text": "Algebra", "subject": "Math", "parent": ["Equations"]},
                    {"text": "Equations", "subject": "Math", "parent": ["Algebra"]},
                    {"text": "Painting", "subject": "Art", "parent": ["Algebra"]}
                ]
            }"#,
        );

        let Normalized { dataset, report } = normalize_combined(&input, now());

        let algebra = dataset.topic(&EntityId::new("algebra")).unwrap();
        let equations = dataset.topic(&EntityId::new("equations")).unwrap();
        let painting = dataset.topic(&EntityId::new("painting")).unwrap();
        assert_eq!(algebra.parent_topic_id, Some(EntityId::new("equations")));
        assert_eq!(equations.parent_topic_id, None);
        assert_eq!(painting.parent_topic_id, None);
        assert_eq!(report.rejected_parents.len(), 2);
        assert!(dataset.violations().is_empty());
    }

    #[test]
    fn unknown_topic_is_synthesized_once() {
        let input = parse(
            r#"{
                "subjects": ["Math"],
                "learning_outcomes": [
                    {"text": "A", "subject": "Math", "topic": "Geometry"},
                    {"text": "B", "subject": "Math", "topic": " Geometry "}
                ]
            }"#,
        );

        let Normalized { dataset, report } = normalize_combined(&input, now());

        assert_eq!(dataset.topics().len(), 1);
        let geometry = &dataset.topics()[0];
        assert_eq!(geometry.name, "Geometry");
        assert_eq!(geometry.status, PublicationStatus::Draft);
        assert_eq!(geometry.subject_id.as_str(), "math");
        assert!(dataset.outcomes().iter().all(|o| o.topic_id == geometry.id));
        assert_eq!(report.synthesized_topics, vec![geometry.id.clone()]);
    }

    #[test]
    fn missing_subject_uses_single_fallback() {
        let input = parse(
            r#"{
                "topics": [{"text": "Loose"}, {"text": "Also loose", "subject": "Nowhere "}],
                "learning_outcomes": [{"text": "Orphan"}]
            }"#,
        );

        let Normalized { dataset, report } = normalize_combined(&input, now());

        // "Nowhere" is mentioned, so it becomes a real subject
        let titles: Vec<_> = dataset.subjects().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Nowhere", "Unspecified"]);
        let fallback = report.fallback_subject.clone().unwrap();
        assert_eq!(dataset.topic(&EntityId::new("loose")).unwrap().subject_id, fallback);

        // the topic-less outcome lands in a draft "Unspecified" topic
        let orphan = &dataset.outcomes()[0];
        let holder = dataset.topic(&orphan.topic_id).unwrap();
        assert_eq!(holder.name, "Unspecified");
        assert_eq!(holder.subject_id, fallback);
        assert!(dataset.violations().is_empty());
    }

    #[test]
    fn relations_resolve_in_second_pass() {
        let input = parse(
            r#"{
                "subjects": ["Math"],
                "topics": [{"text": "Numbers", "subject": "Math"}],
                "learning_outcomes": [
                    {"text": "Add", "topic": "Numbers", "expects": ["Count", "Ghost", "Add", "Count"]},
                    {"text": "Count", "topic": "Numbers", "url": "https://ex.org/count",
                     "consists_of": "https://ex.org/count"}
                ]
            }"#,
        );

        let Normalized { dataset, report } = normalize_combined(&input, now());

        let add = dataset.outcome(&EntityId::new("add")).unwrap();
        assert_eq!(add.expects, vec![EntityId::new("count")]);
        let count = dataset.outcome(&EntityId::new("count")).unwrap();
        assert!(count.consists_of.is_empty());
        assert_eq!(
            report.dropped_relations,
            vec![DroppedRelation {
                outcome: EntityId::new("add"),
                reference: "Ghost".to_string()
            }]
        );
    }

    #[test]
    fn skill_bits_resolve_by_label_or_uri_and_are_dense() {
        let input = parse(
            r#"{
                "subjects": ["Math"],
                "topics": [{"text": "Numbers", "subject": "Math"}],
                "learning_outcomes": [
                    {"text": "Count", "topic": "Numbers", "url": "https://ex.org/Count/"}
                ],
                "sub_skills": [
                    {"text": "Count to ten", "outcome": "Count", "order": 7},
                    {"text": "Count backwards", "outcome": "https://EX.org/count", "order": 3},
                    {"text": "Lost", "outcome": "Nothing"}
                ]
            }"#,
        );

        let Normalized { dataset, report } = normalize_combined(&input, now());

        let labels: Vec<_> = dataset
            .skill_bits()
            .iter()
            .map(|s| (s.label.as_str(), s.manual_order))
            .collect();
        assert_eq!(labels, vec![("Count backwards", 1), ("Count to ten", 2)]);
        assert_eq!(report.dropped_skill_bits.len(), 1);
        assert_eq!(report.dropped_skill_bits[0].label, "Lost");
        assert!(dataset.violations().is_empty());
    }

    #[test]
    fn normalization_is_deterministic() {
        let input = parse(
            r#"{
                "subjects": ["Math", "Math"],
                "topics": [{"text": "Algebra", "subject": "Math"}, {"text": "Algebra", "subject": "Math"}],
                "learning_outcomes": [{"text": "Solve", "topic": "Algebra"}]
            }"#,
        );

        let first = normalize_combined(&input, now());
        let second = normalize_combined(&input, now());

        assert_eq!(first, second);
        let ids: Vec<_> = first.dataset.topics().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["algebra", "algebra-2"]);
    }
}
