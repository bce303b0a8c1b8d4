//! Shared domain types for flowgraph.
//!
//! This crate contains the types shared by the engine, its collaborators and
//! the CLI: graphs, run options, status events, subflow definitions and the
//! engine configuration.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod run;
pub mod subflow;
