//! Report sink service
//!
//! Persists outcomes as they are produced. Each report file has its own
//! lock, and a row is serialized and flushed while the lock is held, so
//! concurrent tasks never interleave partial rows and a killed run still
//! leaves every completed row on disk.

use anyhow::{Context, Result, anyhow};
use palette_core::domain::outcome::{Outcome, OutcomeKind};
use palette_core::dto::report::{ErrorRow, ReportRow, SkippedRow, SuccessRow};
use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::ReportPaths;

/// Service trait for persisting outcomes
///
/// Implementations must accept calls from many tasks at once.
pub trait ReportSink: Send + Sync {
    /// Persists one outcome
    fn record(&self, outcome: Outcome) -> Result<()>;

    /// Number of outcomes recorded so far, per class
    fn counts(&self) -> ReportCounts;
}

/// Per-class row counts of a sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportCounts {
    pub success: usize,
    pub skipped: usize,
    pub error: usize,
    /// Outcomes that could not be written
    pub write_failures: usize,
}

impl ReportCounts {
    /// Outcomes seen by the sink, written or not
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.error + self.write_failures
    }
}

#[derive(Default)]
struct Counters {
    success: AtomicUsize,
    skipped: AtomicUsize,
    error: AtomicUsize,
    write_failures: AtomicUsize,
}

impl Counters {
    fn bump(&self, kind: OutcomeKind) {
        let counter = match kind {
            OutcomeKind::Success => &self.success,
            OutcomeKind::Skipped => &self.skipped,
            OutcomeKind::Error => &self.error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ReportCounts {
        ReportCounts {
            success: self.success.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// One CSV report, shared by all tasks
struct ReportFile<R> {
    path: PathBuf,
    /// The file did not exist before this run opened it
    created: bool,
    writer: Mutex<csv::Writer<File>>,
    /// Set once a row failed to reach the file
    failed: AtomicBool,
    _row: PhantomData<fn(&R)>,
}

impl<R: ReportRow> ReportFile<R> {
    /// Opens the report without touching its contents
    fn open(path: &Path, append: bool) -> Result<Self> {
        let created = !path.exists();

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true);
        }

        let file = options
            .open(path)
            .with_context(|| format!("Failed to open report {}", path.display()))?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        Ok(Self {
            path: path.to_path_buf(),
            created,
            writer: Mutex::new(writer),
            failed: AtomicBool::new(false),
            _row: PhantomData,
        })
    }

    /// Truncates the report unless appending, then writes the header if it is empty
    fn start(&self, append: bool) -> Result<()> {
        let mut writer = self.lock()?;

        if !append {
            writer
                .get_ref()
                .set_len(0)
                .with_context(|| format!("Failed to truncate report {}", self.path.display()))?;
        }

        let is_empty = writer
            .get_ref()
            .metadata()
            .with_context(|| format!("Failed to stat report {}", self.path.display()))?
            .len()
            == 0;

        if is_empty {
            writer
                .write_record(R::HEADERS)
                .with_context(|| format!("Failed to write header to {}", self.path.display()))?;
            writer
                .flush()
                .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        }

        debug!("Opened report {}", self.path.display());
        Ok(())
    }

    /// Closes the report, removing the file if this run created it
    fn discard(self) {
        let Self { path, created, writer, .. } = self;
        drop(writer);

        if created {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove report {}: {}", path.display(), e);
            }
        }
    }

    fn append(&self, row: &R) -> Result<()> {
        let mut writer = self.lock()?;

        // The csv buffer may still hold part of a failed row
        if self.failed.load(Ordering::Acquire) {
            return Err(anyhow!(
                "Report {} is unusable after an earlier write failure",
                self.path.display()
            ));
        }

        let result = writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", self.path.display()))
            .and_then(|()| {
                writer
                    .flush()
                    .with_context(|| format!("Failed to flush {}", self.path.display()))
            });

        if result.is_err() {
            self.failed.store(true, Ordering::Release);
        }

        result
    }

    fn lock(&self) -> Result<MutexGuard<'_, csv::Writer<File>>> {
        self.writer
            .lock()
            .map_err(|_| anyhow!("Report writer for {} is poisoned", self.path.display()))
    }
}

/// Sink writing the success, skipped and error CSV reports
pub struct CsvReportSink {
    success: ReportFile<SuccessRow>,
    skipped: ReportFile<SkippedRow>,
    error: ReportFile<ErrorRow>,
    counters: Counters,
}

impl CsvReportSink {
    /// Opens all three reports
    ///
    /// Existing reports are only truncated once all three files could be
    /// opened. If any of them fails, files created by this call are removed
    /// and the others are left as they were. All files exist with a header
    /// once this returns, even if the run produces no rows for them.
    pub fn open(paths: &ReportPaths) -> Result<Self> {
        let opened = (
            ReportFile::<SuccessRow>::open(&paths.success, paths.append),
            ReportFile::<SkippedRow>::open(&paths.skipped, paths.append),
            ReportFile::<ErrorRow>::open(&paths.error, paths.append),
        );

        let (success, skipped, error) = match opened {
            (Ok(success), Ok(skipped), Ok(error)) => (success, skipped, error),
            (success, skipped, error) => {
                let mut first_error = None;
                settle(success, &mut first_error);
                settle(skipped, &mut first_error);
                settle(error, &mut first_error);
                return Err(first_error.unwrap_or_else(|| anyhow!("Failed to open reports")));
            }
        };

        success.start(paths.append)?;
        skipped.start(paths.append)?;
        error.start(paths.append)?;

        info!(
            "Writing reports: success={} skipped={} error={}",
            paths.success.display(),
            paths.skipped.display(),
            paths.error.display()
        );

        Ok(Self {
            success,
            skipped,
            error,
            counters: Counters::default(),
        })
    }
}

/// Discards an opened report or keeps the first open error
fn settle<R: ReportRow>(opened: Result<ReportFile<R>>, first_error: &mut Option<anyhow::Error>) {
    match opened {
        Ok(report) => report.discard(),
        Err(e) => {
            first_error.get_or_insert(e);
        }
    }
}

impl ReportSink for CsvReportSink {
    fn record(&self, outcome: Outcome) -> Result<()> {
        let kind = outcome.kind();

        let result = match outcome {
            Outcome::Success { request } => self.success.append(&SuccessRow::from(request)),
            Outcome::Skipped { record, reason } => {
                self.skipped.append(&SkippedRow::new(record, reason))
            }
            Outcome::Error { request, message } => {
                self.error.append(&ErrorRow::new(request, message))
            }
        };

        match &result {
            Ok(()) => self.counters.bump(kind),
            Err(_) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        result
    }

    fn counts(&self) -> ReportCounts {
        self.counters.snapshot()
    }
}

/// Sink used when no report files are requested
///
/// Outcomes are already logged by the processor, so this only counts them.
#[derive(Default)]
pub struct LogReportSink {
    counters: Counters,
}

impl LogReportSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for LogReportSink {
    fn record(&self, outcome: Outcome) -> Result<()> {
        debug!(
            serial = outcome.serial(),
            outcome = %outcome.kind(),
            "Outcome not persisted, reporting disabled"
        );
        self.counters.bump(outcome.kind());
        Ok(())
    }

    fn counts(&self) -> ReportCounts {
        self.counters.snapshot()
    }
}
