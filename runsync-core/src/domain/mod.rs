//! Core domain types
//!
//! These types represent the declarative objects the controller reads and
//! writes (pipelines and their run records) and the read-only projection of
//! runs reported by the CI engine.

pub mod event;
pub mod meta;
pub mod pipeline;
pub mod pipeline_run;
pub mod run;
