//! Graph execution core.
//!
//! - `analysis` -- wave computation and branch reachability for display
//! - `context` -- per-run execution state and edge indices
//! - `resolve` -- parent-output ordering and template substitution
//! - `condition` -- IfElse condition evaluator
//! - `dispatch` -- handler table and kind-based routing
//! - `builtin` -- handlers for the pure data-transform kinds
//! - `executor` -- the parallel scheduler
//! - `subflow` -- nested graph runner with bypass cache

pub mod analysis;
pub mod builtin;
pub mod condition;
pub mod context;
pub mod dispatch;
pub mod executor;
pub mod resolve;
pub mod subflow;
