//! The flowgraph engine.
//!
//! This crate defines the scheduler, the data-flow resolver and the
//! collaborator traits ("ports") that `flowgraph-infra` implements. It depends
//! only on `flowgraph-types` -- never on `flowgraph-infra` or any process or
//! filesystem crate.

pub mod event;
pub mod llm;
pub mod repository;
pub mod workflow;
