//! checkgrid-runs: the test run state machine.
//!
//! The [`RunStateMachine`] is the only writer of run and test status. It
//! admits new runs (eligibility, exclusion, capacity), drives runner
//! processes through a [`checkgrid_executor::Supervisor`], applies the
//! outcomes they report, and publishes every committed transition.
//!
//! ```text
//! wait_running ──► running ──► finished | error
//!      │              │
//!      └──► stopped ◄─┘
//!              │
//! finished | error | stopped ──► restarted ──► running
//! ```

pub mod error;
pub mod machine;
pub mod slots;
pub mod transitions;

pub use error::{RunError, RunResult};
pub use machine::{RunStateMachine, StartRequest};
pub use slots::{Admission, Slots};
