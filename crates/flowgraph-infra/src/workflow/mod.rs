//! Live node handlers: the built-in table plus the process and filesystem
//! backed kinds.

pub mod command;
pub mod handlers;

pub use handlers::{cli_handler, live_handlers};
