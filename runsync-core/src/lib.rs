//! Runsync Core
//!
//! Core types shared by the Runsync controller and the CI engine client.
//!
//! This crate contains:
//! - Domain types: pipelines, pipeline run records, external runs, events
//! - Well-known annotation and label keys the run identity depends on
//! - DTOs: wire shapes of the CI engine's run listing

pub mod domain;
pub mod dto;
pub mod keys;
