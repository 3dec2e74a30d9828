//! Data Transfer Objects
//!
//! Flat row shapes written to the run reports. Each outcome variant has its
//! own row type with a fixed column order.

pub mod report;
