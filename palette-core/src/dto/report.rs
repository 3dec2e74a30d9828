//! Report rows

use serde::{Deserialize, Serialize, Serializer};

use crate::domain::outcome::SkipReason;
use crate::domain::record::Record;
use crate::domain::request::{FunctionType, GenerationRequest};

/// A row type with a fixed header
pub trait ReportRow: Serialize {
    const HEADERS: &'static [&'static str];
}

/// Row of the success report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRow {
    pub source_url: String,
    pub source_serial: String,
    #[serde(serialize_with = "shortest_float")]
    pub period_seconds: f64,
    pub palette_size: u32,
    pub function_type: FunctionType,
    pub destination_uri: String,
}

impl ReportRow for SuccessRow {
    const HEADERS: &'static [&'static str] = &[
        "source_url",
        "source_serial",
        "period_seconds",
        "palette_size",
        "function_type",
        "destination_uri",
    ];
}

impl From<GenerationRequest> for SuccessRow {
    fn from(request: GenerationRequest) -> Self {
        Self {
            source_url: request.source_url,
            source_serial: request.source_serial,
            period_seconds: request.period_seconds,
            palette_size: request.palette_size,
            function_type: request.function_type,
            destination_uri: request.destination_uri,
        }
    }
}

/// Row of the skipped report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub serial: String,
    pub original_file_path: String,
    pub source_url: String,
    pub destination_uri: String,
    pub reason: String,
}

impl ReportRow for SkippedRow {
    const HEADERS: &'static [&'static str] = &[
        "serial",
        "original_file_path",
        "source_url",
        "destination_uri",
        "reason",
    ];
}

impl SkippedRow {
    pub fn new(record: Record, reason: SkipReason) -> Self {
        Self {
            serial: record.serial,
            original_file_path: record.original_file_path,
            source_url: record.source_url,
            destination_uri: record.destination_url,
            reason: reason.as_str().to_string(),
        }
    }
}

/// Row of the error report
///
/// csv cannot serialize flattened structs, so the request columns are repeated
/// here instead of embedding a [`SuccessRow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub source_url: String,
    pub source_serial: String,
    #[serde(serialize_with = "shortest_float")]
    pub period_seconds: f64,
    pub palette_size: u32,
    pub function_type: FunctionType,
    pub destination_uri: String,
    pub error_message: String,
}

impl ReportRow for ErrorRow {
    const HEADERS: &'static [&'static str] = &[
        "source_url",
        "source_serial",
        "period_seconds",
        "palette_size",
        "function_type",
        "destination_uri",
        "error_message",
    ];
}

impl ErrorRow {
    pub fn new(request: GenerationRequest, message: String) -> Self {
        Self {
            source_url: request.source_url,
            source_serial: request.source_serial,
            period_seconds: request.period_seconds,
            palette_size: request.palette_size,
            function_type: request.function_type,
            destination_uri: request.destination_uri,
            error_message: message,
        }
    }
}

/// Writes `60.0` as `60` and `0.5` as `0.5`
fn shortest_float<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
