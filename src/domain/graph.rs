//! Relation graph for learning outcomes
//!
//! Outcomes relate to each other in two ways: an outcome *expects* its
//! prerequisites, and *consists of* its parts. Both are stored on the outcome
//! as ID lists; this module lifts them into a petgraph for browsing.
//!
//! Edges point from the outcome to the outcome it names.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use thiserror::Error;

use super::entity::LearningOutcome;
use super::id::EntityId;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Learning outcome not found: {0}")]
    OutcomeNotFound(EntityId),

    #[error("Prerequisites of {0} form a cycle")]
    CycleDetected(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Expects,
    ConsistsOf,
}

/// Directed multigraph over outcome IDs
#[derive(Debug, Default)]
pub struct RelationGraph {
    graph: DiGraph<EntityId, RelationKind>,

    node_map: HashMap<EntityId, NodeIndex>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from outcome relation lists
    ///
    /// References to outcomes outside the collection are skipped.
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a LearningOutcome>) -> Self {
        let mut graph = Self::new();

        let outcomes: Vec<_> = outcomes.into_iter().collect();
        for outcome in &outcomes {
            graph.add_outcome(outcome.id.clone());
        }

        for outcome in &outcomes {
            for target in &outcome.expects {
                graph.add_relation(&outcome.id, target, RelationKind::Expects);
            }
            for target in &outcome.consists_of {
                graph.add_relation(&outcome.id, target, RelationKind::ConsistsOf);
            }
        }

        graph
    }

    pub fn add_outcome(&mut self, id: EntityId) {
        if !self.node_map.contains_key(&id) {
            let idx = self.graph.add_node(id.clone());
            self.node_map.insert(id, idx);
        }
    }

    /// Adds an edge unless either end is unknown or it is a self-reference
    pub fn add_relation(&mut self, from: &EntityId, to: &EntityId, kind: RelationKind) -> bool {
        if from == to {
            return false;
        }
        match (self.node_map.get(from), self.node_map.get(to)) {
            (Some(&a), Some(&b)) => {
                self.graph.add_edge(a, b, kind);
                true
            }
            _ => false,
        }
    }

    fn neighbors(&self, id: &EntityId, kind: RelationKind, direction: Direction) -> Vec<EntityId> {
        let Some(&idx) = self.node_map.get(id) else {
            return vec![];
        };

        let mut seen = HashSet::new();
        self.graph
            .edges_directed(idx, direction)
            .filter(|edge| *edge.weight() == kind)
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .filter(|n| seen.insert(*n))
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Outcomes that `id` expects
    pub fn prerequisites(&self, id: &EntityId) -> Vec<EntityId> {
        self.neighbors(id, RelationKind::Expects, Direction::Outgoing)
    }

    /// Outcomes that expect `id`
    pub fn dependents(&self, id: &EntityId) -> Vec<EntityId> {
        self.neighbors(id, RelationKind::Expects, Direction::Incoming)
    }

    /// Outcomes that `id` consists of
    pub fn parts(&self, id: &EntityId) -> Vec<EntityId> {
        self.neighbors(id, RelationKind::ConsistsOf, Direction::Outgoing)
    }

    /// Outcomes that list `id` as a part
    pub fn part_of(&self, id: &EntityId) -> Vec<EntityId> {
        self.neighbors(id, RelationKind::ConsistsOf, Direction::Incoming)
    }

    /// All transitive prerequisites of `id`, foundations first
    pub fn learning_path(&self, id: &EntityId) -> Result<Vec<EntityId>, GraphError> {
        let &start = self
            .node_map
            .get(id)
            .ok_or_else(|| GraphError::OutcomeNotFound(id.clone()))?;

        let mut sub: DiGraph<NodeIndex, ()> = DiGraph::new();
        let mut local: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        local.insert(start, sub.add_node(start));

        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for edge in self.graph.edges_directed(current, Direction::Outgoing) {
                if *edge.weight() != RelationKind::Expects {
                    continue;
                }
                let target = edge.target();
                let target_local = match local.get(&target) {
                    Some(&n) => n,
                    None => {
                        let n = sub.add_node(target);
                        local.insert(target, n);
                        queue.push_back(target);
                        n
                    }
                };
                sub.update_edge(local[&current], target_local, ());
            }
        }

        let order = toposort(&sub, None).map_err(|_| GraphError::CycleDetected(id.clone()))?;

        Ok(order
            .into_iter()
            .rev()
            .filter_map(|n| sub.node_weight(n).copied())
            .filter(|&n| n != start)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect())
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.node_map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn outcome(id: &str, expects: &[&str], consists_of: &[&str]) -> LearningOutcome {
        let mut o = LearningOutcome::new(EntityId::new(id), id, EntityId::new("t"), Utc::now());
        o.expects = expects.iter().map(|s| EntityId::new(*s)).collect();
        o.consists_of = consists_of.iter().map(|s| EntityId::new(*s)).collect();
        o
    }

    fn ids(list: Vec<EntityId>) -> Vec<String> {
        list.into_iter().map(String::from).collect()
    }

    #[test]
    fn empty_graph() {
        let graph = RelationGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn browses_both_directions() {
        let outcomes = vec![
            outcome("count", &[], &[]),
            outcome("add", &["count"], &[]),
            outcome("arith", &[], &["add", "count"]),
        ];
        let graph = RelationGraph::from_outcomes(&outcomes);

        assert_eq!(ids(graph.prerequisites(&EntityId::new("add"))), vec!["count"]);
        assert_eq!(ids(graph.dependents(&EntityId::new("count"))), vec!["add"]);
        let mut parts = ids(graph.parts(&EntityId::new("arith")));
        parts.sort();
        assert_eq!(parts, vec!["add", "count"]);
        assert_eq!(ids(graph.part_of(&EntityId::new("add"))), vec!["arith"]);
        assert!(graph.prerequisites(&EntityId::new("unknown")).is_empty());
    }

    #[test]
    fn skips_dangling_and_self_edges() {
        let outcomes = vec![outcome("a", &["a", "ghost"], &["ghost"])];
        let graph = RelationGraph::from_outcomes(&outcomes);

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn learning_path_puts_foundations_first() {
        let outcomes = vec![
            outcome("count", &[], &[]),
            outcome("add", &["count"], &[]),
            outcome("multiply", &["add"], &[]),
            outcome("unrelated", &[], &[]),
        ];
        let graph = RelationGraph::from_outcomes(&outcomes);

        let path = graph.learning_path(&EntityId::new("multiply")).unwrap();
        assert_eq!(ids(path), vec!["count", "add"]);
        assert!(graph.learning_path(&EntityId::new("count")).unwrap().is_empty());
    }

    #[test]
    fn learning_path_errors() {
        let outcomes = vec![outcome("a", &["b"], &[]), outcome("b", &["a"], &[])];
        let graph = RelationGraph::from_outcomes(&outcomes);

        assert_eq!(
            graph.learning_path(&EntityId::new("a")),
            Err(GraphError::CycleDetected(EntityId::new("a")))
        );
        assert_eq!(
            graph.learning_path(&EntityId::new("zzz")),
            Err(GraphError::OutcomeNotFound(EntityId::new("zzz")))
        );
    }
}
