//! Status delivery for graph runs.
//!
//! The executor reports through the [`StatusSink`] trait. Implementations:
//! the broadcast [`EventBus`] for multi-consumer UIs, [`FnSink`] for plain
//! callbacks, [`MemorySink`] for collecting events, and [`NullSink`].

pub mod bus;
pub mod sink;

pub use bus::EventBus;
pub use sink::{FnSink, MemorySink, NullSink, StatusSink};
