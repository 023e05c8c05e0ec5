use chrono::Utc;

use super::error::required_text;
use super::input::{NewSkillBit, SkillBitPatch};
use super::{assign_id, CurriculumStore, Removal, StoreError};
use crate::domain::ordering::{move_sibling, next_manual_order, renumber_siblings, sibling_order};
use crate::domain::{Direction, EntityId, EntityKind, SkillBit};

/// Moves `id` to 1-based `position` within its group and renumbers the group
fn place_at(skill_bits: &mut [SkillBit], id: &EntityId, position: u32) {
    let Some(outcome) = skill_bits
        .iter()
        .find(|s| &s.id == id)
        .map(|s| s.outcome_id.clone())
    else {
        return;
    };

    let mut others: Vec<usize> = skill_bits
        .iter()
        .enumerate()
        .filter(|(_, s)| s.outcome_id == outcome && &s.id != id)
        .map(|(i, _)| i)
        .collect();
    others.sort_by(|&a, &b| sibling_order(&skill_bits[a], &skill_bits[b]));

    let Some(own) = skill_bits.iter().position(|s| &s.id == id) else {
        return;
    };
    let slot = (position.max(1) as usize - 1).min(others.len());
    others.insert(slot, own);

    for (rank, &i) in others.iter().enumerate() {
        skill_bits[i].manual_order = rank as u32 + 1;
    }
}

impl CurriculumStore {
    pub fn skill_bits(&self) -> &[SkillBit] {
        self.current.skill_bits()
    }

    pub fn skill_bit(&self, id: &EntityId) -> Result<&SkillBit, StoreError> {
        self.current
            .skill_bit(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::SkillBit, id))
    }

    /// Skill-bits of an outcome in manual order
    pub fn skill_bits_for_outcome(&self, outcome: &EntityId) -> Result<Vec<&SkillBit>, StoreError> {
        self.outcome(outcome)?;
        Ok(self.current.skill_bits_for_outcome(outcome).collect())
    }

    pub fn skill_bit_count(&self, outcome: &EntityId) -> Result<usize, StoreError> {
        self.outcome(outcome)?;
        Ok(self.current.skill_bit_count(outcome))
    }

    /// Creates a skill-bit, appending it unless a position is given
    pub fn create_skill_bit(&mut self, input: NewSkillBit) -> Result<SkillBit, StoreError> {
        let label = required_text("label", &input.label)?;
        self.outcome(&input.outcome_id)
            .map_err(|_| StoreError::missing(EntityKind::LearningOutcome, &input.outcome_id))?;

        let id = assign_id(
            EntityKind::SkillBit,
            input.id,
            &label,
            self.current.skill_bits().iter().map(|s| &s.id),
        )?;

        let mut skill_bits = self.current.skill_bits().to_vec();
        let order = next_manual_order(&skill_bits, &input.outcome_id);
        skill_bits.push(SkillBit::new(
            id.clone(),
            label,
            input.outcome_id.clone(),
            order,
            Utc::now(),
        ));

        match input.manual_order {
            Some(position) => place_at(&mut skill_bits, &id, position),
            None => renumber_siblings(&mut skill_bits, &input.outcome_id),
        }

        let created = skill_bits
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::SkillBit, &id))?;

        let mut next = self.current.clone();
        next.set_skill_bits(skill_bits);
        self.commit(next, "create skill-bit");

        Ok(created)
    }

    /// Updates a skill-bit
    ///
    /// Moving it to another outcome appends it there unless a position is
    /// given; both the old and the new group are renumbered.
    pub fn update_skill_bit(&mut self, id: &EntityId, patch: SkillBitPatch) -> Result<SkillBit, StoreError> {
        let previous = self.skill_bit(id)?.outcome_id.clone();

        if let Some(outcome) = &patch.outcome_id {
            self.outcome(outcome)
                .map_err(|_| StoreError::missing(EntityKind::LearningOutcome, outcome))?;
        }
        let label = patch
            .label
            .as_deref()
            .map(|label| required_text("label", label))
            .transpose()?;

        let mut skill_bits = self.current.skill_bits().to_vec();
        let target = patch.outcome_id.unwrap_or_else(|| previous.clone());
        let appended = next_manual_order(&skill_bits, &target);

        let bit = skill_bits
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StoreError::not_found(EntityKind::SkillBit, id))?;
        if let Some(label) = label {
            bit.label = label;
        }
        if target != previous {
            bit.outcome_id = target.clone();
            bit.manual_order = appended;
        }
        bit.touch(Utc::now());

        if let Some(position) = patch.manual_order {
            place_at(&mut skill_bits, id, position);
        }
        renumber_siblings(&mut skill_bits, &previous);
        renumber_siblings(&mut skill_bits, &target);

        let updated = skill_bits
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::SkillBit, id))?;

        let mut next = self.current.clone();
        next.set_skill_bits(skill_bits);
        self.commit(next, "update skill-bit");

        Ok(updated)
    }

    /// Deletes a skill-bit and closes the gap it leaves
    pub fn delete_skill_bit(&mut self, id: &EntityId) -> Result<Removal, StoreError> {
        self.skill_bit(id)?;

        let removal = Removal::cascade(&self.current, &[], &[], &[], std::slice::from_ref(id));
        let next = removal.apply(&self.current, Utc::now());
        self.commit(next, "delete skill-bit");

        Ok(removal)
    }

    /// Moves a skill-bit one position among its siblings
    ///
    /// Returns false when it already sits at that end; nothing is persisted
    /// and observers are not notified then.
    pub fn reorder_skill_bit(&mut self, id: &EntityId, direction: Direction) -> Result<bool, StoreError> {
        let mut skill_bits = self.current.skill_bits().to_vec();
        let moved = move_sibling(&mut skill_bits, id, direction)
            .ok_or_else(|| StoreError::not_found(EntityKind::SkillBit, id))?;
        if !moved {
            return Ok(false);
        }

        if let Some(bit) = skill_bits.iter_mut().find(|s| &s.id == id) {
            bit.touch(Utc::now());
        }

        let mut next = self.current.clone();
        next.set_skill_bits(skill_bits);
        self.commit(next, "reorder skill-bit");

        Ok(true)
    }
}
