//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "01-engine"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Wait/assert engine and test API exports."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
//! Integration-test harness for live telemetry and event streams.
//!
//! Tests drive a [`TestApi`]: send commands through a
//! [`gse_msg::Transport`], then assert on the accumulated [`History`],
//! either immediately or by waiting until a check holds or a deadline
//! elapses.

pub mod api;
pub mod compare;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod history;

pub use api::{TestApi, Timeout};
pub use compare::{loose_cmp, Expected, Op, ANYTHING};
pub use deadline::{ArmedDeadline, DeadlineExceeded, DeadlineHandle, DeadlineTimer};
pub use engine::{Verdict, WaitAssertEngine, WaitOutcome};
pub use error::{AssertionFailure, FailureKind, HarnessError};
pub use history::{Category, Filter, History, Record, Selector};
