//! Runsync Controller
//!
//! Keeps pipeline run records consistent with the run history of the CI
//! engine, one pipeline at a time.
//!
//! Architecture:
//! - Repository: object store access (PostgreSQL and in-memory) with
//!   optimistic concurrency, plus the event recorder
//! - Source: the CI engine's run listing behind the `ExternalRunSource` trait
//! - Service: identity matching, diffing, record construction and the
//!   synchronizer that drives a single sync pass
//! - Scheduler: the level-triggered work queue and controller loop that
//!   invoke the synchronizer
//!
//! A pass only does work when the pipeline carries the sync request marker,
//! and clears the marker once the pass has been applied.

pub mod config;
pub mod db;
pub mod error;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod source;

pub use error::SyncError;
pub use service::synchronizer::{PipelineRunSynchronizer, SyncOutcome, SyncSummary};
