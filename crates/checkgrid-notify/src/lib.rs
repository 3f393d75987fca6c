//! checkgrid-notify: publishes committed run and test transitions.
//!
//! Publication is at-most-once and best effort. [`Notifier::publish`]
//! never blocks and never fails; events wait in a bounded queue drained by
//! a single delivery task, so events reach the sink in publish order.

pub mod error;
pub mod event;
pub mod notifier;
pub mod sink;

pub use error::PublishError;
pub use event::RunEvent;
pub use notifier::Notifier;
pub use sink::{EventSink, HttpSink, LogSink, MemorySink};
