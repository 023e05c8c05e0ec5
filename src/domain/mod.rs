//! Domain models for the curriculum dataset
//!
//! Contains the core business logic without any I/O concerns.

mod dataset;
mod entity;
mod graph;
pub mod hierarchy;
mod id;
pub mod ordering;
mod resolver;

pub use dataset::{Dataset, DatasetCounts, Violation};
pub use entity::{
    display_order, DisplayOrdered, LearningOutcome, PublicationStatus, SkillBit, Subject, Topic,
};
pub use graph::{GraphError, RelationGraph, RelationKind};
pub use hierarchy::{HierarchyError, TopicNode, UnplacedTopic};
pub use id::{slugify, EntityId, EntityKind, IdAllocator, IdError};
pub use ordering::Direction;
pub use resolver::ReferenceTable;
