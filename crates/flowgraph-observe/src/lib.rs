//! Observability for flowgraph: tracing subscriber setup.

pub mod tracing_setup;
