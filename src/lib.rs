//! Curriculum CLI - a local-first manager for curriculum data
//!
//! A curriculum is a tree of subjects and topics. Topics carry learning
//! outcomes, which relate to each other (prerequisites and parts) and break
//! down into ordered skill-bits. The crate ingests loosely shaped raw
//! datasets into a canonical [`domain::Dataset`] and keeps it editable
//! through the [`store::CurriculumStore`].

pub mod domain;
pub mod ingest;
pub mod storage;
pub mod store;
pub mod cli;

pub use domain::{Dataset, EntityId, LearningOutcome, SkillBit, Subject, Topic};
pub use store::CurriculumStore;
