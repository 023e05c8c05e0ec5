//! Manual ordering of skill-bits
//!
//! Skill-bits under one outcome carry a dense 1-based `manual_order`. Every
//! mutation that adds, removes or moves a skill-bit renumbers the affected
//! sibling group so positions stay 1..N without gaps.

use std::cmp::Ordering;

use super::entity::SkillBit;
use super::id::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Manual order ascending, then creation time descending
pub fn sibling_order(a: &SkillBit, b: &SkillBit) -> Ordering {
    a.manual_order
        .cmp(&b.manual_order)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Rewrites `manual_order` for the skill-bits of `outcome` to 1..N
///
/// The relative order of siblings is preserved.
pub fn renumber_siblings(skill_bits: &mut [SkillBit], outcome: &EntityId) {
    let mut positions: Vec<usize> = skill_bits
        .iter()
        .enumerate()
        .filter(|(_, s)| &s.outcome_id == outcome)
        .map(|(i, _)| i)
        .collect();

    positions.sort_by(|&a, &b| sibling_order(&skill_bits[a], &skill_bits[b]));

    for (rank, &i) in positions.iter().enumerate() {
        skill_bits[i].manual_order = rank as u32 + 1;
    }
}

/// Renumbers every sibling group
pub fn renumber_all(skill_bits: &mut [SkillBit]) {
    let mut outcomes: Vec<EntityId> = skill_bits.iter().map(|s| s.outcome_id.clone()).collect();
    outcomes.sort();
    outcomes.dedup();

    for outcome in &outcomes {
        renumber_siblings(skill_bits, outcome);
    }
}

/// Position a new skill-bit appended to `outcome` would take
pub fn next_manual_order(skill_bits: &[SkillBit], outcome: &EntityId) -> u32 {
    skill_bits
        .iter()
        .filter(|s| &s.outcome_id == outcome)
        .map(|s| s.manual_order)
        .max()
        .unwrap_or(0)
        + 1
}

/// Swaps a skill-bit with its neighbour in `direction`
///
/// Returns `None` if the skill-bit does not exist, `Some(false)` if it is
/// already at that end of its group, `Some(true)` if it moved.
pub fn move_sibling(skill_bits: &mut [SkillBit], id: &EntityId, direction: Direction) -> Option<bool> {
    let outcome = skill_bits.iter().find(|s| &s.id == id)?.outcome_id.clone();
    renumber_siblings(skill_bits, &outcome);

    let mut group: Vec<usize> = skill_bits
        .iter()
        .enumerate()
        .filter(|(_, s)| s.outcome_id == outcome)
        .map(|(i, _)| i)
        .collect();
    group.sort_by_key(|&i| skill_bits[i].manual_order);

    let pos = group.iter().position(|&i| &skill_bits[i].id == id)?;
    let neighbour = match direction {
        Direction::Up if pos > 0 => group[pos - 1],
        Direction::Down if pos + 1 < group.len() => group[pos + 1],
        _ => return Some(false),
    };
    let current = group[pos];

    let a = skill_bits[current].manual_order;
    skill_bits[current].manual_order = skill_bits[neighbour].manual_order;
    skill_bits[neighbour].manual_order = a;

    Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bit(id: &str, outcome: &str, order: u32) -> SkillBit {
        SkillBit::new(EntityId::new(id), id, EntityId::new(outcome), order, Utc::now())
    }

    fn order_of(bits: &[SkillBit], outcome: &str) -> Vec<(String, u32)> {
        let mut group: Vec<_> = bits
            .iter()
            .filter(|s| s.outcome_id.as_str() == outcome)
            .map(|s| (s.id.to_string(), s.manual_order))
            .collect();
        group.sort_by_key(|(_, o)| *o);
        group
    }

    #[test]
    fn renumber_closes_gaps_per_outcome() {
        let mut bits = vec![
            bit("a", "o1", 5),
            bit("x", "o2", 9),
            bit("b", "o1", 2),
            bit("c", "o1", 40),
        ];

        renumber_siblings(&mut bits, &EntityId::new("o1"));

        assert_eq!(
            order_of(&bits, "o1"),
            vec![("b".into(), 1), ("a".into(), 2), ("c".into(), 3)]
        );
        assert_eq!(order_of(&bits, "o2"), vec![("x".into(), 9)]);

        renumber_all(&mut bits);
        assert_eq!(order_of(&bits, "o2"), vec![("x".into(), 1)]);
    }

    #[test]
    fn ties_put_newest_first() {
        let now = Utc::now();
        let mut old = bit("old", "o", 1);
        old.created_at = now;
        let mut new = bit("new", "o", 1);
        new.created_at = now + Duration::seconds(1);
        let mut bits = vec![old, new];

        renumber_all(&mut bits);

        assert_eq!(order_of(&bits, "o"), vec![("new".into(), 1), ("old".into(), 2)]);
    }

    #[test]
    fn next_order_appends() {
        let bits = vec![bit("a", "o", 1), bit("b", "o", 2)];
        assert_eq!(next_manual_order(&bits, &EntityId::new("o")), 3);
        assert_eq!(next_manual_order(&bits, &EntityId::new("other")), 1);
    }

    #[test]
    fn move_swaps_neighbours_and_clamps() {
        let mut bits = vec![bit("a", "o", 1), bit("b", "o", 2), bit("c", "o", 3)];

        assert_eq!(move_sibling(&mut bits, &EntityId::new("c"), Direction::Up), Some(true));
        assert_eq!(
            order_of(&bits, "o"),
            vec![("a".into(), 1), ("c".into(), 2), ("b".into(), 3)]
        );

        assert_eq!(move_sibling(&mut bits, &EntityId::new("a"), Direction::Up), Some(false));
        assert_eq!(move_sibling(&mut bits, &EntityId::new("b"), Direction::Down), Some(false));
        assert_eq!(move_sibling(&mut bits, &EntityId::new("zzz"), Direction::Down), None);
    }
}
