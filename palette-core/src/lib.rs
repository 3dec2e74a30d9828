//! Palette Core
//!
//! Core types and pure logic for the palette batch runner.
//!
//! This crate contains:
//! - Domain types: records, generation requests and per-record outcomes
//! - Locator: derivation of storage URLs from records and output settings
//! - DTOs: report rows written by the result sink

pub mod domain;
pub mod dto;
pub mod locator;

pub use locator::{Locator, LocatorError, ObjectLocation, ResultNaming};
