//! Topic hierarchy
//!
//! Topics form a forest: each topic has at most one parent, the parent must
//! belong to the same subject, and no topic may be its own ancestor.
//!
//! - [`assign_parents`] places topics during bulk ingestion, trying each
//!   candidate parent reference in preference order
//! - [`validate_parent`] re-checks a parent change against the stored tree
//! - [`build_tree`] / [`flatten_with_depth`] materialize the forest for display
//! - [`collect_descendant_ids`] and [`collect_descendants_of`] compute cascade sets

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use thiserror::Error;

use super::entity::{display_order, Topic};
use super::id::EntityId;
use super::resolver::ReferenceTable;

#[derive(Debug, Error, PartialEq)]
pub enum HierarchyError {
    #[error("Topic cannot be its own parent: {0}")]
    SelfParent(EntityId),

    #[error("Parent topic not found: {0}")]
    UnknownParent(EntityId),

    #[error("Parent topic {parent} belongs to subject {parent_subject}, not {subject}")]
    CrossSubject {
        parent: EntityId,
        parent_subject: EntityId,
        subject: EntityId,
    },

    #[error("Making {parent} the parent of {topic} would create a cycle")]
    Cycle { topic: EntityId, parent: EntityId },
}

/// A topic whose parent references were all rejected during ingestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnplacedTopic {
    pub topic: EntityId,
    pub references: Vec<String>,
}

/// Walks the ancestor chain of `candidate`
///
/// Returns true if `topic` appears on it, or if the chain loops back on
/// itself without reaching `topic` (corrupt input).
fn creates_cycle(
    topic: &EntityId,
    candidate: &EntityId,
    parents: &HashMap<EntityId, EntityId>,
) -> bool {
    let mut visited = HashSet::new();
    let mut current = Some(candidate);

    while let Some(id) = current {
        if id == topic || !visited.insert(id) {
            return true;
        }
        current = parents.get(id);
    }

    false
}

fn check_candidate(
    topic: &EntityId,
    subject: &EntityId,
    candidate: &EntityId,
    subject_of: &HashMap<EntityId, EntityId>,
    parents: &HashMap<EntityId, EntityId>,
) -> Result<(), HierarchyError> {
    if candidate == topic {
        return Err(HierarchyError::SelfParent(topic.clone()));
    }

    let parent_subject = subject_of
        .get(candidate)
        .ok_or_else(|| HierarchyError::UnknownParent(candidate.clone()))?;

    if parent_subject != subject {
        return Err(HierarchyError::CrossSubject {
            parent: candidate.clone(),
            parent_subject: parent_subject.clone(),
            subject: subject.clone(),
        });
    }

    if creates_cycle(topic, candidate, parents) {
        return Err(HierarchyError::Cycle {
            topic: topic.clone(),
            parent: candidate.clone(),
        });
    }

    Ok(())
}

/// Assigns at most one parent per topic from ordered candidate references
///
/// `candidates[i]` lists the parent references of `topics[i]` in preference
/// order. The first candidate that resolves through `table`, is not the topic
/// itself, shares its subject and does not close a cycle wins. Topics with no
/// accepted candidate become roots. Topics are processed in slice order, so
/// cycle checks see only the links accepted so far.
pub fn assign_parents(
    topics: &mut [Topic],
    candidates: &[Vec<String>],
    table: &ReferenceTable,
) -> Vec<UnplacedTopic> {
    let subject_of: HashMap<EntityId, EntityId> = topics
        .iter()
        .map(|t| (t.id.clone(), t.subject_id.clone()))
        .collect();

    let mut parents: HashMap<EntityId, EntityId> = HashMap::new();
    let mut unplaced = Vec::new();

    for (topic, references) in topics.iter_mut().zip(candidates) {
        let accepted = references.iter().find_map(|reference| {
            let candidate = table.resolve(reference)?;
            check_candidate(&topic.id, &topic.subject_id, candidate, &subject_of, &parents)
                .ok()
                .map(|_| candidate.clone())
        });

        match accepted {
            Some(parent) => {
                parents.insert(topic.id.clone(), parent.clone());
                topic.parent_topic_id = Some(parent);
            }
            None => {
                topic.parent_topic_id = None;
                if references.iter().any(|r| !r.trim().is_empty()) {
                    unplaced.push(UnplacedTopic {
                        topic: topic.id.clone(),
                        references: references.clone(),
                    });
                }
            }
        }
    }

    unplaced
}

/// Checks that `parent` may become the parent of `topic` in `subject`
///
/// Runs against the stored topics, not the original input. `topic` may be
/// absent from `topics` when it is about to be created.
pub fn validate_parent(
    topics: &[Topic],
    topic: &EntityId,
    subject: &EntityId,
    parent: &EntityId,
) -> Result<(), HierarchyError> {
    let subject_of: HashMap<EntityId, EntityId> = topics
        .iter()
        .map(|t| (t.id.clone(), t.subject_id.clone()))
        .collect();

    let parents: HashMap<EntityId, EntityId> = topics
        .iter()
        .filter_map(|t| t.parent_topic_id.clone().map(|p| (t.id.clone(), p)))
        .collect();

    check_candidate(topic, subject, parent, &subject_of, &parents)
}

/// A topic with its recursively ordered children
#[derive(Debug, Clone, Serialize)]
pub struct TopicNode<'a> {
    pub topic: &'a Topic,
    pub children: Vec<TopicNode<'a>>,
}

impl TopicNode<'_> {
    /// Number of topics in this subtree, including the root
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TopicNode::size).sum::<usize>()
    }
}

/// Builds the topic forest
///
/// Topics whose parent is missing from the input are treated as roots.
/// Siblings are ordered by order hint ascending, then creation time
/// descending.
pub fn build_tree<'a>(topics: impl IntoIterator<Item = &'a Topic>) -> Vec<TopicNode<'a>> {
    let topics: Vec<&Topic> = topics.into_iter().collect();
    let known: HashSet<&EntityId> = topics.iter().map(|t| &t.id).collect();

    let mut children: HashMap<&EntityId, Vec<&Topic>> = HashMap::new();
    let mut roots = Vec::new();

    for &topic in &topics {
        match &topic.parent_topic_id {
            Some(parent) if parent != &topic.id && known.contains(parent) => {
                children.entry(parent).or_default().push(topic);
            }
            _ => roots.push(topic),
        }
    }

    let mut visited = HashSet::new();
    let mut nodes: Vec<TopicNode<'a>> = roots
        .into_iter()
        .filter_map(|root| build_node(root, &children, &mut visited))
        .collect();
    nodes.sort_by(|a, b| display_order(a.topic, b.topic));
    nodes
}

fn build_node<'a>(
    topic: &'a Topic,
    children: &HashMap<&EntityId, Vec<&'a Topic>>,
    visited: &mut HashSet<&'a EntityId>,
) -> Option<TopicNode<'a>> {
    if !visited.insert(&topic.id) {
        return None;
    }

    let mut nodes: Vec<TopicNode<'a>> = match children.get(&topic.id) {
        Some(list) => list
            .iter()
            .filter_map(|&child| build_node(child, children, visited))
            .collect(),
        None => Vec::new(),
    };
    nodes.sort_by(|a, b| display_order(a.topic, b.topic));

    Some(TopicNode {
        topic,
        children: nodes,
    })
}

/// Pre-order traversal yielding each topic with its depth (roots at 0)
pub fn flatten_with_depth<'a>(roots: &[TopicNode<'a>]) -> Vec<(&'a Topic, usize)> {
    fn walk<'a>(node: &TopicNode<'a>, depth: usize, out: &mut Vec<(&'a Topic, usize)>) {
        out.push((node.topic, depth));
        for child in &node.children {
            walk(child, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    for root in roots {
        walk(root, 0, &mut out);
    }
    out
}

/// Breadth-first collection of every descendant of `root` (excluding `root`)
pub fn collect_descendant_ids(topics: &[Topic], root: &EntityId) -> Vec<EntityId> {
    collect_descendants_of(topics, std::slice::from_ref(root))
}

/// Descendants of any of `roots` in one walk, excluding the roots themselves
pub fn collect_descendants_of(topics: &[Topic], roots: &[EntityId]) -> Vec<EntityId> {
    let mut children: HashMap<&EntityId, Vec<&EntityId>> = HashMap::new();
    for topic in topics {
        if let Some(parent) = &topic.parent_topic_id {
            children.entry(parent).or_default().push(&topic.id);
        }
    }

    let mut visited: HashSet<&EntityId> = roots.iter().collect();
    let mut queue: VecDeque<&EntityId> = roots.iter().collect();
    let mut descendants = Vec::new();

    while let Some(current) = queue.pop_front() {
        for &child in children.get(current).into_iter().flatten() {
            if visited.insert(child) {
                descendants.push(child.clone());
                queue.push_back(child);
            }
        }
    }

    descendants
}
