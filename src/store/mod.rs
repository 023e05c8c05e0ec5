//! # Mutation Store
//!
//! [`CurriculumStore`] owns the canonical dataset for a session. Every
//! operation works on a cheap clone of the current [`Dataset`], replaces the
//! collections it touches and then commits: the new state becomes current,
//! the snapshot is persisted and observers are notified, in that order. A
//! failed operation returns before the commit, leaving the dataset as it was.
//!
//! | Module | Operations |
//! |--------|------------|
//! | `subjects` | create, update, delete (cascading) |
//! | `topics` | create, update (re-parenting, subject moves), delete (cascading) |
//! | `outcomes` | create, update, delete (relation pruning) |
//! | `skill_bits` | create, update, delete, reorder; per-outcome listing |
//!
//! Persistence is best-effort: a failed snapshot write is logged and the
//! in-memory state stays authoritative.

mod error;
mod input;
mod outcomes;
mod skill_bits;
mod subjects;
mod topics;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::hierarchy::collect_descendants_of;
use crate::domain::ordering::renumber_all;
use crate::domain::{Dataset, EntityId, EntityKind, IdAllocator};
use crate::ingest::{normalize_combined, seed_dataset, CombinedInput, IngestReport, Normalized};
use crate::storage::{DatasetLoader, DatasetSource, LoadError, MemorySnapshotStore, Snapshot, SnapshotSink};

pub use error::StoreError;
pub use input::{
    NewOutcome, NewSkillBit, NewSubject, NewTopic, OutcomePatch, SkillBitPatch, SubjectPatch,
    TopicPatch,
};

type Observer = Box<dyn Fn(&Dataset)>;

/// Handle returned by [`CurriculumStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Everything a delete removed, including cascaded entities
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Removal {
    pub subjects: Vec<EntityId>,
    pub topics: Vec<EntityId>,
    pub learning_outcomes: Vec<EntityId>,
    pub skill_bits: Vec<EntityId>,
}

fn push_unique(list: &mut Vec<EntityId>, seen: &mut HashSet<EntityId>, id: &EntityId) {
    if seen.insert(id.clone()) {
        list.push(id.clone());
    }
}

impl Removal {
    /// Expands the directly deleted entities to the full cascade
    fn cascade(
        dataset: &Dataset,
        subjects: &[EntityId],
        topics: &[EntityId],
        outcomes: &[EntityId],
        skill_bits: &[EntityId],
    ) -> Self {
        let mut removal = Removal {
            subjects: subjects.to_vec(),
            ..Default::default()
        };

        let removed_subjects: HashSet<&EntityId> = subjects.iter().collect();
        let mut seen = HashSet::new();
        for id in topics {
            push_unique(&mut removal.topics, &mut seen, id);
        }
        for topic in dataset.topics() {
            if removed_subjects.contains(&topic.subject_id) {
                push_unique(&mut removal.topics, &mut seen, &topic.id);
            }
        }
        for descendant in collect_descendants_of(dataset.topics(), &removal.topics) {
            push_unique(&mut removal.topics, &mut seen, &descendant);
        }

        let removed_topics = seen;
        let mut seen = HashSet::new();
        for id in outcomes {
            push_unique(&mut removal.learning_outcomes, &mut seen, id);
        }
        for outcome in dataset.outcomes() {
            if removed_topics.contains(&outcome.topic_id) {
                push_unique(&mut removal.learning_outcomes, &mut seen, &outcome.id);
            }
        }

        let removed_outcomes = seen;
        let mut seen = HashSet::new();
        for id in skill_bits {
            push_unique(&mut removal.skill_bits, &mut seen, id);
        }
        for bit in dataset.skill_bits() {
            if removed_outcomes.contains(&bit.outcome_id) {
                push_unique(&mut removal.skill_bits, &mut seen, &bit.id);
            }
        }

        removal
    }

    /// Builds the dataset without the removed entities
    ///
    /// Surviving outcomes lose relations to removed ones and surviving
    /// skill-bit groups are renumbered.
    fn apply(&self, dataset: &Dataset, now: DateTime<Utc>) -> Dataset {
        let mut next = dataset.clone();

        if !self.subjects.is_empty() {
            let removed: HashSet<&EntityId> = self.subjects.iter().collect();
            next.set_subjects(
                dataset
                    .subjects()
                    .iter()
                    .filter(|s| !removed.contains(&s.id))
                    .cloned()
                    .collect(),
            );
        }

        if !self.topics.is_empty() {
            let removed: HashSet<&EntityId> = self.topics.iter().collect();
            next.set_topics(
                dataset
                    .topics()
                    .iter()
                    .filter(|t| !removed.contains(&t.id))
                    .cloned()
                    .collect(),
            );
        }

        if !self.learning_outcomes.is_empty() {
            let removed: HashSet<&EntityId> = self.learning_outcomes.iter().collect();
            let mut outcomes: Vec<_> = dataset
                .outcomes()
                .iter()
                .filter(|o| !removed.contains(&o.id))
                .cloned()
                .collect();
            for outcome in &mut outcomes {
                if outcome.remove_relations(&removed) {
                    outcome.touch(now);
                }
            }
            next.set_outcomes(outcomes);
        }

        if !self.skill_bits.is_empty() {
            let removed: HashSet<&EntityId> = self.skill_bits.iter().collect();
            let mut bits: Vec<_> = dataset
                .skill_bits()
                .iter()
                .filter(|s| !removed.contains(&s.id))
                .cloned()
                .collect();
            renumber_all(&mut bits);
            next.set_skill_bits(bits);
        }

        next
    }

    /// Number of removed entities across all kinds
    pub fn total(&self) -> usize {
        self.subjects.len() + self.topics.len() + self.learning_outcomes.len() + self.skill_bits.len()
    }
}

/// Uses the supplied ID or allocates one from `label`
fn assign_id<'a>(
    kind: EntityKind,
    supplied: Option<EntityId>,
    label: &str,
    existing: impl Iterator<Item = &'a EntityId>,
) -> Result<EntityId, StoreError> {
    let existing: Vec<&EntityId> = existing.collect();

    match supplied {
        Some(id) => {
            let id: EntityId = id.as_str().parse()?;
            if existing.contains(&&id) {
                return Err(StoreError::DuplicateId { kind, id });
            }
            Ok(id)
        }
        None => {
            let index = existing.len() + 1;
            let mut ids = IdAllocator::with_reserved(kind, existing);
            Ok(ids.allocate(kind, label, index))
        }
    }
}

pub struct CurriculumStore {
    current: Dataset,
    baseline: Option<Dataset>,
    sink: Box<dyn SnapshotSink>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl CurriculumStore {
    /// Opens the store from a snapshot sink
    ///
    /// An empty or unreadable sink starts from the built-in seed data.
    pub fn open(sink: impl SnapshotSink + 'static) -> Self {
        let (current, baseline) = match sink.load() {
            Ok(Some(snapshot)) => {
                debug!(counts = ?snapshot.dataset.counts(), "Restored snapshot");
                (snapshot.dataset, snapshot.baseline)
            }
            Ok(None) => {
                debug!("No snapshot yet; starting from seed data");
                (seed_dataset().dataset, None)
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Unreadable snapshot; starting from seed data");
                (seed_dataset().dataset, None)
            }
        };

        Self {
            current,
            baseline,
            sink: Box::new(sink),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// A store that persists nothing beyond the process
    pub fn in_memory() -> Self {
        Self::open(MemorySnapshotStore::new())
    }

    /// Starts from `dataset` without reading the sink
    pub fn with_dataset(dataset: Dataset, sink: impl SnapshotSink + 'static) -> Self {
        Self {
            current: dataset,
            baseline: None,
            sink: Box::new(sink),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// The current dataset
    pub fn dataset(&self) -> &Dataset {
        &self.current
    }

    /// The reset target, if a dataset was ever loaded
    pub fn baseline(&self) -> Option<&Dataset> {
        self.baseline.as_ref()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.current.clone(), self.baseline.clone())
    }

    /// Registers a callback run after every committed change
    pub fn subscribe(&mut self, observer: impl Fn(&Dataset) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        before != self.observers.len()
    }

    fn commit(&mut self, next: Dataset, action: &str) {
        self.current = next;
        debug!(action, counts = ?self.current.counts(), "Committed change");
        self.persist();

        for (_, observer) in &self.observers {
            observer(&self.current);
        }
    }

    fn persist(&self) {
        if let Err(e) = self.sink.save(&self.snapshot()) {
            warn!(error = %format!("{:#}", e), "Failed to persist snapshot; keeping in-memory state");
        }
    }

    /// Replaces the dataset with a freshly normalized one and makes it the
    /// reset baseline
    pub fn install(&mut self, normalized: &Normalized) {
        info!(
            shape = %normalized.report.shape,
            counts = ?normalized.dataset.counts(),
            clean = normalized.report.is_clean(),
            "Installed dataset"
        );
        self.baseline = Some(normalized.dataset.clone());
        self.commit(normalized.dataset.clone(), "install");
    }

    /// Loads through `loader`; on failure the dataset is left unchanged
    pub fn load_from<S: DatasetSource>(
        &mut self,
        loader: &DatasetLoader<S>,
    ) -> Result<IngestReport, LoadError> {
        let normalized = loader.ensure_ready()?;
        self.install(&normalized);
        Ok(normalized.report.clone())
    }

    /// Replaces the dataset with a combined-shape document
    pub fn import_combined(&mut self, input: &CombinedInput) -> IngestReport {
        let normalized = normalize_combined(input, Utc::now());
        self.install(&normalized);
        normalized.report
    }

    /// Restores the baseline, or the seed data if nothing was ever loaded
    pub fn reset(&mut self) {
        let target = match &self.baseline {
            Some(baseline) => baseline.clone(),
            None => seed_dataset().dataset,
        };
        self.commit(target, "reset");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::domain::Direction;

    pub(crate) fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    pub(crate) fn seeded() -> (CurriculumStore, MemorySnapshotStore) {
        let sink = MemorySnapshotStore::new();
        (CurriculumStore::open(sink.clone()), sink)
    }

    #[test]
    fn empty_sink_starts_from_seed() {
        let (store, sink) = seeded();
        assert_eq!(store.dataset(), &seed_dataset().dataset);
        assert!(store.baseline().is_none());
        assert!(sink.content().is_none());
    }

    #[test]
    fn corrupt_snapshot_starts_from_seed() {
        let store = CurriculumStore::open(MemorySnapshotStore::with_content("{ nope"));
        assert_eq!(store.dataset(), &seed_dataset().dataset);
    }

    #[test]
    fn mutations_persist_and_reopen() {
        let (mut store, sink) = seeded();
        store
            .create_subject(NewSubject {
                title: "Physics".to_string(),
                ..Default::default()
            })
            .unwrap();

        let reopened = CurriculumStore::open(sink.clone());
        assert!(reopened.dataset().subject(&id("physics")).is_some());
        assert_eq!(reopened.dataset(), store.dataset());
    }

    #[test]
    fn failed_writes_keep_memory_state() {
        let mut store = CurriculumStore::open(MemorySnapshotStore::failing());
        store
            .create_subject(NewSubject {
                title: "Physics".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(store.dataset().subject(&id("physics")).is_some());
    }

    #[test]
    fn observers_run_after_commit_and_can_unsubscribe() {
        let (mut store, sink) = seeded();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        let probe = sink.clone();
        let sub = store.subscribe(move |dataset| {
            // The snapshot is already written when observers run
            assert!(probe.content().is_some());
            log.borrow_mut().push(dataset.counts().subjects);
        });

        store
            .create_subject(NewSubject {
                title: "Physics".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(*seen.borrow(), vec![2]);

        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.reset();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failed_operations_do_not_notify() {
        let (mut store, _) = seeded();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        store.subscribe(move |_| *counter.borrow_mut() += 1);

        let before = store.dataset().clone();
        assert!(store.delete_topic(&id("missing")).is_err());
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(store.dataset(), &before);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let (mut store, _) = seeded();
        let held = store.dataset().clone();
        let topics = held.topics_handle();

        store.delete_subject(&id("mathematics")).unwrap();

        assert_eq!(topics.len(), 3);
        assert_eq!(held.counts().skill_bits, 4);
        assert!(store.dataset().topics().is_empty());
    }

    #[test]
    fn import_becomes_reset_baseline() {
        let (mut store, sink) = seeded();
        let input = CombinedInput::from_json(
            r#"{
                "subjects": ["Math"],
                "topics": [{"text": "Algebra", "subject": ["Math"]}],
                "learning_outcomes": [
                    {"text": "Solve linear equations", "subject": ["Math"], "topic": ["Algebra"]}
                ]
            }"#,
        )
        .unwrap();

        let report = store.import_combined(&input);
        assert!(report.is_clean());
        let imported = store.dataset().clone();
        let counts = imported.counts();
        assert_eq!((counts.subjects, counts.topics, counts.learning_outcomes, counts.skill_bits), (1, 1, 1, 0));

        store.delete_subject(&id("math")).unwrap();
        assert!(store.dataset().is_empty());

        store.reset();
        assert_eq!(store.dataset(), &imported);

        let reopened = CurriculumStore::open(sink);
        assert_eq!(reopened.baseline(), Some(&imported));
    }

    #[test]
    fn reset_without_baseline_restores_seed() {
        let (mut store, _) = seeded();
        store.delete_subject(&id("mathematics")).unwrap();
        store.reset();
        assert_eq!(store.dataset(), &seed_dataset().dataset);
    }

    #[test]
    fn failed_load_leaves_dataset_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let loader = DatasetLoader::new(
            crate::storage::DirectorySource::new(dir.path()),
            crate::storage::DatasetFiles::default(),
        );
        let (mut store, _) = seeded();

        assert!(store.load_from(&loader).is_err());
        assert_eq!(store.dataset(), &seed_dataset().dataset);

        std::fs::write(
            dir.path().join("curriculum.json"),
            r#"{"subjects": ["Art"], "topics": [{"text": "Drawing", "subject": "Art"}]}"#,
        )
        .unwrap();
        let report = store.load_from(&loader).unwrap();
        assert_eq!(report.shape, crate::ingest::InputShape::Combined);
        assert!(store.dataset().subject(&id("art")).is_some());
        assert!(store.baseline().is_some());
    }

    #[test]
    fn assign_id_rejects_taken_and_invalid_ids() {
        let existing = [id("algebra")];
        assert_eq!(
            assign_id(EntityKind::Topic, None, "Algebra", existing.iter()).unwrap(),
            id("algebra-2")
        );
        assert!(matches!(
            assign_id(EntityKind::Topic, Some(id("algebra")), "x", existing.iter()),
            Err(StoreError::DuplicateId { .. })
        ));
        assert!(matches!(
            assign_id(EntityKind::Topic, Some(id("has space")), "x", existing.iter()),
            Err(StoreError::InvalidId(_))
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            AddTopic { parent: usize },
            Reparent { topic: usize, parent: usize },
            DeleteTopic(usize),
            AddBit { outcome: usize, order: Option<u32> },
            MoveBit { bit: usize, up: bool },
            RetargetBit { bit: usize, outcome: usize },
            DeleteBit(usize),
            DeleteOutcome(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..8usize).prop_map(|parent| Op::AddTopic { parent }),
                (0..8usize, 0..8usize).prop_map(|(topic, parent)| Op::Reparent { topic, parent }),
                (0..8usize).prop_map(Op::DeleteTopic),
                (0..4usize, proptest::option::of(0..6u32))
                    .prop_map(|(outcome, order)| Op::AddBit { outcome, order }),
                (0..8usize, any::<bool>()).prop_map(|(bit, up)| Op::MoveBit { bit, up }),
                (0..8usize, 0..4usize).prop_map(|(bit, outcome)| Op::RetargetBit { bit, outcome }),
                (0..8usize).prop_map(Op::DeleteBit),
                (0..4usize).prop_map(Op::DeleteOutcome),
            ]
        }

        fn nth<T: Clone>(items: &[T], i: usize) -> Option<T> {
            if items.is_empty() {
                None
            } else {
                Some(items[i % items.len()].clone())
            }
        }

        fn run(store: &mut CurriculumStore, op: Op) {
            let dataset = store.dataset().clone();
            let topics: Vec<EntityId> = dataset.topics().iter().map(|t| t.id.clone()).collect();
            let outcomes: Vec<EntityId> = dataset.outcomes().iter().map(|o| o.id.clone()).collect();
            let bits: Vec<EntityId> = dataset.skill_bits().iter().map(|s| s.id.clone()).collect();

            // Individual operations may be rejected; only the invariants matter
            let _ = match op {
                Op::AddTopic { parent } => {
                    let mut topic = NewTopic::new("Generated", id("mathematics"));
                    topic.parent_topic_id = nth(&topics, parent);
                    store.create_topic(topic).map(|_| ())
                }
                Op::Reparent { topic, parent } => match (nth(&topics, topic), nth(&topics, parent)) {
                    (Some(topic), Some(parent)) => store
                        .update_topic(
                            &topic,
                            TopicPatch {
                                parent_topic_id: Some(Some(parent)),
                                ..Default::default()
                            },
                        )
                        .map(|_| ()),
                    _ => Ok(()),
                },
                Op::DeleteTopic(i) => match nth(&topics, i) {
                    Some(topic) => store.delete_topic(&topic).map(|_| ()),
                    None => Ok(()),
                },
                Op::AddBit { outcome, order } => match nth(&outcomes, outcome) {
                    Some(outcome) => {
                        let mut bit = NewSkillBit::new("Generated", outcome);
                        bit.manual_order = order;
                        store.create_skill_bit(bit).map(|_| ())
                    }
                    None => Ok(()),
                },
                Op::MoveBit { bit, up } => match nth(&bits, bit) {
                    Some(bit) => {
                        let direction = if up { Direction::Up } else { Direction::Down };
                        store.reorder_skill_bit(&bit, direction).map(|_| ())
                    }
                    None => Ok(()),
                },
                Op::RetargetBit { bit, outcome } => match (nth(&bits, bit), nth(&outcomes, outcome)) {
                    (Some(bit), Some(outcome)) => store
                        .update_skill_bit(
                            &bit,
                            SkillBitPatch {
                                outcome_id: Some(outcome),
                                ..Default::default()
                            },
                        )
                        .map(|_| ()),
                    _ => Ok(()),
                },
                Op::DeleteBit(i) => match nth(&bits, i) {
                    Some(bit) => store.delete_skill_bit(&bit).map(|_| ()),
                    None => Ok(()),
                },
                Op::DeleteOutcome(i) => match nth(&outcomes, i) {
                    Some(outcome) => store.delete_outcome(&outcome).map(|_| ()),
                    None => Ok(()),
                },
            };
        }

        proptest! {
            #[test]
            fn mutations_keep_the_dataset_canonical(ops in proptest::collection::vec(op(), 1..30)) {
                let mut store = CurriculumStore::in_memory();
                for op in ops {
                    run(&mut store, op);
                    let violations = store.dataset().violations();
                    prop_assert!(violations.is_empty(), "{:?}", violations);
                }
            }
        }
    }
}
