//! Palette Runner
//!
//! Runs color palette extraction for a batch of stored videos.
//!
//! Architecture:
//! - Configuration: Built once from the command line and shared read-only
//! - Input: CSV rows resolved into records with source and destination URLs
//! - Repositories: Object storage existence checks and the palette service
//! - Services: Per-record classification and report writing
//! - Scheduler: Bounded fan-out of records and the final drain
//!
//! Every record ends as exactly one success, skipped or error row. A run that
//! drains exits normally however many records failed; only startup problems
//! (bad configuration, unreadable input, unopenable reports) abort it.

mod config;
mod input;
mod repository;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use palette_client::PaletteClient;
use palette_core::ResultNaming;
use palette_core::domain::request::{FunctionType, GenerationSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::{
    DEFAULT_OUTPUT_PREFIX, DEFAULT_REGION, DEFAULT_WORKERS, JobConfig, ReportPaths, ServiceConfig,
};
use crate::scheduler::{DispatchSummary, JobDispatcher};
use crate::service::{
    CsvReportSink, LogReportSink, ReportCounts, ReportSink, StandardRecordProcessor,
};
use crate::repository::{HttpPaletteGenerator, S3ObjectStorage};

#[derive(Parser)]
#[command(name = "palette-runner")]
#[command(about = "Batch color palette extraction for stored videos", long_about = None)]
struct Cli {
    /// Input file in CSV format with `serial` and `original_file_path` columns
    #[arg(short, long, env = "PALETTE_INPUT_FILE")]
    input_file: PathBuf,

    /// Base URL of the palette service
    #[arg(long, env = "PALETTE_BASE_URL")]
    base_url: String,

    /// API key of the palette service
    #[arg(long, env = "PALETTE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Bucket holding the source videos
    #[arg(long, env = "PALETTE_INPUT_BUCKET")]
    input_bucket: String,

    /// Bucket receiving the results
    #[arg(long, env = "PALETTE_OUTPUT_BUCKET")]
    output_bucket: String,

    /// Key prefix of the results
    #[arg(long, env = "PALETTE_OUTPUT_PREFIX", default_value = DEFAULT_OUTPUT_PREFIX)]
    output_prefix: String,

    /// Storage region
    #[arg(long, env = "PALETTE_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Number of records processed in parallel
    #[arg(long, env = "PALETTE_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Check everything but do not call the palette service
    #[arg(long)]
    dry_run: bool,

    /// Skip records whose result already exists
    #[arg(long)]
    skip_if_exists: bool,

    /// Result file naming: `serial` or `source-path`
    #[arg(long, default_value = "serial")]
    result_naming: ResultNaming,

    /// Sampling period in seconds
    #[arg(long, default_value_t = 60.0)]
    period_seconds: f64,

    /// Number of colors per palette
    #[arg(long, default_value_t = 5)]
    palette_size: u32,

    /// Palette extraction function
    #[arg(long, default_value_t = 1)]
    function_type: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Save outcomes to success, skipped and error CSV reports
    SaveResult {
        /// Success report in CSV
        #[arg(long)]
        success_file: PathBuf,

        /// Skipped report in CSV
        #[arg(long)]
        skipped_file: PathBuf,

        /// Error report in CSV
        #[arg(long)]
        error_file: PathBuf,

        /// Append to existing reports instead of replacing them
        #[arg(long)]
        append: bool,
    },
}

impl Cli {
    fn job_config(&self) -> JobConfig {
        JobConfig {
            workers: self.workers,
            dry_run: self.dry_run,
            skip_if_exists: self.skip_if_exists,
            input_bucket: self.input_bucket.clone(),
            output_bucket: self.output_bucket.clone(),
            output_prefix: self.output_prefix.clone(),
            region: self.region.clone(),
            result_naming: self.result_naming,
            generation: GenerationSettings {
                period_seconds: self.period_seconds,
                palette_size: self.palette_size,
                function_type: FunctionType(self.function_type),
            },
        }
    }

    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
        }
    }

    fn report_paths(&self) -> Option<ReportPaths> {
        match &self.command {
            Some(Command::SaveResult {
                success_file,
                skipped_file,
                error_file,
                append,
            }) => Some(ReportPaths {
                success: success_file.clone(),
                skipped: skipped_file.clone(),
                error: error_file.clone(),
                append: *append,
            }),
            None => None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "palette_runner=info,palette_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.job_config();
    config.validate().context("Invalid job configuration")?;

    let service = cli.service_config();
    service
        .validate()
        .context("Invalid palette service configuration")?;

    // One runtime thread per worker
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    let reports = cli.report_paths();
    runtime.block_on(run(cli.input_file, config, service, reports))
}

async fn run(
    input_file: PathBuf,
    config: JobConfig,
    service: ServiceConfig,
    reports: Option<ReportPaths>,
) -> Result<()> {
    let run_id = Uuid::new_v4();
    info!("Starting palette run {}", run_id);
    info!(
        "Loaded configuration: input_bucket={}, output_bucket={}, output_prefix={}, workers={}, dry_run={}, skip_if_exists={}",
        config.input_bucket,
        config.output_bucket,
        config.output_prefix,
        config.workers,
        config.dry_run,
        config.skip_if_exists
    );

    let records = input::load_records(&input_file, &config.locator())?;

    let sink: Arc<dyn ReportSink> = match &reports {
        Some(paths) => Arc::new(CsvReportSink::open(paths)?),
        None => {
            info!("No report files requested, outcomes are only logged");
            Arc::new(LogReportSink::new())
        }
    };

    let storage = Arc::new(S3ObjectStorage::connect(&config.region).await);
    let generator = Arc::new(HttpPaletteGenerator::new(PaletteClient::new(
        service.base_url,
        service.api_key,
    )));

    info!("Services initialized");

    let config = Arc::new(config);
    let processor = Arc::new(StandardRecordProcessor::new(
        Arc::clone(&config),
        storage,
        generator,
    ));

    let dispatcher = JobDispatcher::new(config.workers, processor, Arc::clone(&sink));
    let summary = dispatcher.run(records).await?;

    let counts = sink.counts();
    info!(
        "Run {} finished: success={} skipped={} error={} write_failures={}",
        run_id, counts.success, counts.skipped, counts.error, counts.write_failures
    );
    print_summary(run_id, &summary, &counts);

    Ok(())
}

/// Prints a short human-readable summary of the run
fn print_summary(run_id: Uuid, summary: &DispatchSummary, counts: &ReportCounts) {
    println!();
    println!("{}", format!("Run {} finished", run_id).bold());
    println!("  Records:  {}", summary.submitted);
    println!("  Success:  {}", counts.success.to_string().green());
    println!("  Skipped:  {}", counts.skipped.to_string().yellow());
    println!("  Error:    {}", counts.error.to_string().red());

    if counts.write_failures > 0 {
        println!(
            "  {}",
            format!("{} outcome(s) could not be written", counts.write_failures).red()
        );
    }

    if summary.panicked > 0 {
        println!(
            "  {}",
            format!("{} record task(s) panicked", summary.panicked).red()
        );
    }
}
