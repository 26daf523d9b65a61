//! Scheduler layer for the controller
//!
//! This layer decides when sync passes run. It keeps a deduplicated queue of
//! pipeline keys fed by a periodic resync of marked pipelines, and a pool of
//! workers draining it.

pub mod controller;
pub mod queue;

pub use controller::Controller;
pub use queue::WorkQueue;
