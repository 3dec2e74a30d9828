//! Core domain types
//!
//! This module contains the structures that flow through a batch run.
//! Records are produced once during input loading, requests are derived
//! from them at task start, and every task ends with exactly one outcome.

pub mod outcome;
pub mod record;
pub mod request;
