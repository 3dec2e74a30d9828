//! Generation request domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::record::Record;

/// Selector for the palette extraction function on the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionType(pub u8);

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters shared by every request of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// Sampling period in seconds
    pub period_seconds: f64,
    /// Number of colors in the palette
    pub palette_size: u32,
    pub function_type: FunctionType,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            period_seconds: 60.0,
            palette_size: 5,
            function_type: FunctionType(1),
        }
    }
}

/// Payload sent to the palette generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    #[serde(rename = "sourceSerial")]
    pub source_serial: String,
    #[serde(rename = "periodSeconds")]
    pub period_seconds: f64,
    #[serde(rename = "paletteSize")]
    pub palette_size: u32,
    #[serde(rename = "functionType")]
    pub function_type: FunctionType,
    #[serde(rename = "destinationURI")]
    pub destination_uri: String,
}

impl GenerationRequest {
    /// Builds the request for a record
    pub fn for_record(record: &Record, settings: &GenerationSettings) -> Self {
        Self {
            source_url: record.source_url.clone(),
            source_serial: record.serial.clone(),
            period_seconds: settings.period_seconds,
            palette_size: settings.palette_size,
            function_type: settings.function_type,
            destination_uri: record.destination_url.clone(),
        }
    }
}

/// Renders the request as its JSON wire form
impl fmt::Display for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
