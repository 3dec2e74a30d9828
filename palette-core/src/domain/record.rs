//! Record domain types

use serde::{Deserialize, Serialize};

/// A row of the input file, before any location is resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRow {
    pub serial: String,
    pub original_file_path: String,
}

/// One unit of work
///
/// Built by [`crate::Locator::resolve`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub serial: String,
    pub original_file_path: String,
    pub source_url: String,
    pub destination_url: String,
}
