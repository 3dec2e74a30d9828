//! Outcome domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::record::Record;
use crate::domain::request::GenerationRequest;

/// Why a record was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// The source video is not in the input bucket
    SourceMissing,
    /// A result already exists at the destination
    DestinationAlreadyExists,
}

impl SkipReason {
    /// Text written to the skipped report
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::SourceMissing => "InputVideo doesn't exist in sourceURL",
            SkipReason::DestinationAlreadyExists => "Result already exists in destinationURI",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification of one record
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        request: GenerationRequest,
    },
    Skipped {
        record: Record,
        reason: SkipReason,
    },
    Error {
        request: GenerationRequest,
        message: String,
    },
}

/// Discriminant of [`Outcome`], used for counting and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Skipped,
    Error,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::Skipped => write!(f, "skipped"),
            OutcomeKind::Error => write!(f, "error"),
        }
    }
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::Skipped { .. } => OutcomeKind::Skipped,
            Outcome::Error { .. } => OutcomeKind::Error,
        }
    }

    /// Serial of the record this outcome belongs to
    pub fn serial(&self) -> &str {
        match self {
            Outcome::Success { request } | Outcome::Error { request, .. } => &request.source_serial,
            Outcome::Skipped { record, .. } => &record.serial,
        }
    }
}
