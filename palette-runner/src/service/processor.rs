//! Record processing service
//!
//! Classifies one record into exactly one outcome:
//! - Optional idempotency check against the destination
//! - Existence check of the source video
//! - Palette generation, unless running dry
//!
//! Every step short-circuits. Failures become `Outcome::Error` with the full
//! error chain as message; they never escape the task.

use anyhow::{Context, Result};
use async_trait::async_trait;
use palette_core::ObjectLocation;
use palette_core::domain::outcome::{Outcome, SkipReason};
use palette_core::domain::record::Record;
use palette_core::domain::request::GenerationRequest;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::JobConfig;
use crate::repository::{ObjectStorage, PaletteGenerator};

/// Service trait for processing one record
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    /// Runs the full pipeline for a record
    ///
    /// Infallible by contract: every failure is folded into the outcome.
    async fn process(&self, record: Record) -> Outcome;

    /// Request that `process` would send for the record
    fn request_for(&self, record: &Record) -> GenerationRequest;
}

/// Standard implementation of RecordProcessor
pub struct StandardRecordProcessor {
    config: Arc<JobConfig>,
    storage: Arc<dyn ObjectStorage>,
    generator: Arc<dyn PaletteGenerator>,
}

impl StandardRecordProcessor {
    /// Creates a new processor
    ///
    /// # Arguments
    /// * `config` - Run configuration
    /// * `storage` - Existence checks for source and destination objects
    /// * `generator` - The palette generation service
    pub fn new(
        config: Arc<JobConfig>,
        storage: Arc<dyn ObjectStorage>,
        generator: Arc<dyn PaletteGenerator>,
    ) -> Self {
        Self {
            config,
            storage,
            generator,
        }
    }

    async fn destination_exists(&self, record: &Record) -> Result<bool> {
        let location = ObjectLocation::from_url(&record.destination_url)
            .context("Failed to resolve destination")?;

        self.storage.exists(&location.bucket, &location.key).await
    }

    async fn classify(&self, record: Record) -> Outcome {
        let request = self.request_for(&record);

        if self.config.skip_if_exists {
            match self.destination_exists(&record).await {
                Ok(true) => {
                    return Outcome::Skipped {
                        record,
                        reason: SkipReason::DestinationAlreadyExists,
                    };
                }
                Ok(false) => {}
                Err(e) => return error_outcome(request, e),
            }
        }

        match self
            .storage
            .exists(&self.config.input_bucket, &record.original_file_path)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return Outcome::Skipped {
                    record,
                    reason: SkipReason::SourceMissing,
                };
            }
            Err(e) => return error_outcome(request, e),
        }

        if self.config.dry_run {
            debug!("Dry run, palette generation not requested");
        } else if let Err(e) = self.generator.generate(&request).await {
            return error_outcome(request, e);
        }

        Outcome::Success { request }
    }
}

#[async_trait]
impl RecordProcessor for StandardRecordProcessor {
    async fn process(&self, record: Record) -> Outcome {
        info!(
            "Processing serial={} original_file_path={}",
            record.serial, record.original_file_path
        );

        let outcome = self.classify(record).await;

        match &outcome {
            Outcome::Success { .. } => info!("Palette requested"),
            Outcome::Skipped { reason, .. } => info!("Skipped: {}", reason),
            Outcome::Error { message, .. } => warn!("Failed: {}", message),
        }

        outcome
    }

    fn request_for(&self, record: &Record) -> GenerationRequest {
        GenerationRequest::for_record(record, &self.config.generation)
    }
}

fn error_outcome(request: GenerationRequest, err: anyhow::Error) -> Outcome {
    Outcome::Error {
        request,
        message: format!("{:#}", err),
    }
}
