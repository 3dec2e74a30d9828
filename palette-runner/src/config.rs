//! Runner configuration
//!
//! Defines the settings of one batch run. The configuration is built once
//! from the command line, validated, and then shared read-only by every task.

use std::path::PathBuf;

use palette_core::domain::request::GenerationSettings;
use palette_core::{Locator, ResultNaming};

pub const DEFAULT_OUTPUT_PREFIX: &str = "video-color-palette-extraction";
pub const DEFAULT_REGION: &str = "ap-southeast-1";
pub const DEFAULT_WORKERS: usize = 4;

/// Settings of a batch run
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Number of records processed in parallel
    pub workers: usize,

    /// Classify records without calling the palette service
    pub dry_run: bool,

    /// Skip records whose result already exists in the output bucket
    pub skip_if_exists: bool,

    /// Bucket holding the source videos
    pub input_bucket: String,

    /// Bucket receiving the generated palettes
    pub output_bucket: String,

    /// Key prefix for generated palettes
    pub output_prefix: String,

    /// Storage region, used for URLs and the S3 client
    pub region: String,

    pub result_naming: ResultNaming,

    pub generation: GenerationSettings,
}

impl JobConfig {
    /// Creates a new configuration with defaults
    pub fn new(input_bucket: String, output_bucket: String) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            dry_run: false,
            skip_if_exists: false,
            input_bucket,
            output_bucket,
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            region: DEFAULT_REGION.to_string(),
            result_naming: ResultNaming::Serial,
            generation: GenerationSettings::default(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be greater than 0");
        }

        if self.input_bucket.is_empty() {
            anyhow::bail!("input_bucket cannot be empty");
        }

        if self.output_bucket.is_empty() {
            anyhow::bail!("output_bucket cannot be empty");
        }

        if self.region.is_empty() {
            anyhow::bail!("region cannot be empty");
        }

        if !(self.generation.period_seconds.is_finite() && self.generation.period_seconds > 0.0) {
            anyhow::bail!("period_seconds must be a positive number");
        }

        if self.generation.palette_size == 0 {
            anyhow::bail!("palette_size must be greater than 0");
        }

        Ok(())
    }

    /// Builds the locator for this run's buckets and naming
    pub fn locator(&self) -> Locator {
        Locator {
            input_bucket: self.input_bucket.clone(),
            output_bucket: self.output_bucket.clone(),
            output_prefix: self.output_prefix.clone(),
            region: self.region.clone(),
            naming: self.result_naming,
        }
    }
}

/// Connection settings for the palette service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service base URL (e.g., "https://abc.execute-api.ap-southeast-1.amazonaws.com")
    pub base_url: String,

    pub api_key: String,
}

impl ServiceConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("base_url cannot be empty");
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base_url must start with http:// or https://");
        }

        if self.api_key.is_empty() {
            anyhow::bail!("api_key cannot be empty");
        }

        Ok(())
    }
}

/// Destination files of the three reports
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub success: PathBuf,
    pub skipped: PathBuf,
    pub error: PathBuf,

    /// Append to existing reports instead of truncating them
    pub append: bool,
}
