//! Infrastructure layer for flowgraph.
//!
//! Contains implementations of the collaborator traits defined in
//! `flowgraph-core`: filesystem graph and subflow loading, the shell command
//! runner behind CLI nodes, and the `config.toml` loader.

pub mod config;
pub mod filesystem;
pub mod workflow;
