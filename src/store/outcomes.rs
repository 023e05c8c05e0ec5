use chrono::Utc;

use super::error::required_text;
use super::input::{optional_text, NewOutcome, OutcomePatch};
use super::{assign_id, CurriculumStore, Removal, StoreError};
use crate::domain::{Dataset, EntityId, EntityKind, LearningOutcome, RelationGraph};

/// Checks user-supplied relation targets, dropping duplicates
fn checked_relations(
    dataset: &Dataset,
    owner: &EntityId,
    field: &'static str,
    targets: Vec<EntityId>,
) -> Result<Vec<EntityId>, StoreError> {
    let mut checked = Vec::with_capacity(targets.len());

    for target in targets {
        if &target == owner {
            return Err(StoreError::Invalid {
                field,
                reason: "an outcome cannot relate to itself".to_string(),
            });
        }
        if dataset.outcome(&target).is_none() {
            return Err(StoreError::missing(EntityKind::LearningOutcome, &target));
        }
        if !checked.contains(&target) {
            checked.push(target);
        }
    }

    Ok(checked)
}

fn next_sort_order(dataset: &Dataset, topic: &EntityId) -> i64 {
    dataset
        .outcomes_for_topic(topic)
        .map(|o| o.sort_order)
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

impl CurriculumStore {
    pub fn outcomes(&self) -> &[LearningOutcome] {
        self.current.outcomes()
    }

    pub fn outcome(&self, id: &EntityId) -> Result<&LearningOutcome, StoreError> {
        self.current
            .outcome(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::LearningOutcome, id))
    }

    pub fn outcomes_for_topic(&self, topic: &EntityId) -> Result<Vec<&LearningOutcome>, StoreError> {
        self.topic(topic)?;
        Ok(self.current.outcomes_for_topic(topic).collect())
    }

    /// Relation graph over the current outcomes
    pub fn relation_graph(&self) -> RelationGraph {
        RelationGraph::from_outcomes(self.current.outcomes())
    }

    pub fn create_outcome(&mut self, input: NewOutcome) -> Result<LearningOutcome, StoreError> {
        let text = required_text("text", &input.text)?;
        self.topic(&input.topic_id)
            .map_err(|_| StoreError::missing(EntityKind::Topic, &input.topic_id))?;

        let id = assign_id(
            EntityKind::LearningOutcome,
            input.id,
            &text,
            self.current.outcomes().iter().map(|o| &o.id),
        )?;
        let expects = checked_relations(&self.current, &id, "expects", input.expects)?;
        let consists_of = checked_relations(&self.current, &id, "consists_of", input.consists_of)?;
        let sort_order = input
            .sort_order
            .unwrap_or_else(|| next_sort_order(&self.current, &input.topic_id));

        let mut outcome = LearningOutcome::new(id, text, input.topic_id, Utc::now());
        outcome.text_localized = optional_text(input.text_localized);
        outcome.uri = optional_text(input.uri);
        outcome.school_level = optional_text(input.school_level);
        outcome.grade = optional_text(input.grade);
        outcome.sort_order = sort_order;
        outcome.status = input.status;
        outcome.expects = expects;
        outcome.consists_of = consists_of;

        let mut outcomes = self.current.outcomes().to_vec();
        outcomes.push(outcome.clone());

        let mut next = self.current.clone();
        next.set_outcomes(outcomes);
        self.commit(next, "create outcome");

        Ok(outcome)
    }

    pub fn update_outcome(
        &mut self,
        id: &EntityId,
        patch: OutcomePatch,
    ) -> Result<LearningOutcome, StoreError> {
        self.outcome(id)?;

        if let Some(topic) = &patch.topic_id {
            self.topic(topic)
                .map_err(|_| StoreError::missing(EntityKind::Topic, topic))?;
        }
        let expects = patch
            .expects
            .map(|targets| checked_relations(&self.current, id, "expects", targets))
            .transpose()?;
        let consists_of = patch
            .consists_of
            .map(|targets| checked_relations(&self.current, id, "consists_of", targets))
            .transpose()?;

        let mut outcomes = self.current.outcomes().to_vec();
        let outcome = outcomes
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| StoreError::not_found(EntityKind::LearningOutcome, id))?;

        if let Some(text) = patch.text {
            outcome.text = required_text("text", &text)?;
        }
        if let Some(localized) = patch.text_localized {
            outcome.text_localized = optional_text(localized);
        }
        if let Some(topic) = patch.topic_id {
            outcome.topic_id = topic;
        }
        if let Some(uri) = patch.uri {
            outcome.uri = optional_text(uri);
        }
        if let Some(level) = patch.school_level {
            outcome.school_level = optional_text(level);
        }
        if let Some(grade) = patch.grade {
            outcome.grade = optional_text(grade);
        }
        if let Some(order) = patch.sort_order {
            outcome.sort_order = order;
        }
        if let Some(status) = patch.status {
            outcome.status = status;
        }
        if let Some(expects) = expects {
            outcome.expects = expects;
        }
        if let Some(consists_of) = consists_of {
            outcome.consists_of = consists_of;
        }
        outcome.touch(Utc::now());
        let updated = outcome.clone();

        let mut next = self.current.clone();
        next.set_outcomes(outcomes);
        self.commit(next, "update outcome");

        Ok(updated)
    }

    /// Deletes an outcome with its skill-bits and drops every relation to it
    pub fn delete_outcome(&mut self, id: &EntityId) -> Result<Removal, StoreError> {
        self.outcome(id)?;

        let removal = Removal::cascade(&self.current, &[], &[], std::slice::from_ref(id), &[]);
        let next = removal.apply(&self.current, Utc::now());
        self.commit(next, "delete outcome");

        Ok(removal)
    }
}
