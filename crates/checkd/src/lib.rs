//! checkd: assembles the checkgrid subsystems into one process.
//!
//! The binary in `main.rs` is a thin operator CLI over [`Daemon`]; the
//! library target exists so integration tests can drive a fully wired
//! daemon against real runner processes.

pub mod daemon;
pub mod logging;

pub use daemon::{is_settled, Daemon};
