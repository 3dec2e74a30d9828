//! Scheduler layer for the runner
//!
//! This layer fans records out to workers and owns the single
//! synchronization point of a run: waiting for every task to drain.

pub mod dispatcher;

pub use dispatcher::{DispatchSummary, DispatcherState, JobDispatcher};
