//! Job dispatcher
//!
//! Fans records out over a fixed number of workers and waits for all of
//! them. Each record runs in its own task holding a semaphore permit, so at
//! most `workers` records are in flight at any time.

use anyhow::{Result, anyhow};
use palette_core::domain::outcome::Outcome;
use palette_core::domain::record::Record;
use palette_core::domain::request::GenerationRequest;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::service::{RecordProcessor, ReportSink};

/// Lifecycle of a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Nothing submitted yet
    Idle,
    /// Tasks submitted, pool draining
    Running,
    /// Every submitted task has returned
    Drained,
}

/// Task accounting of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub submitted: usize,
    pub completed: usize,
    /// Tasks that panicked; each still gets an error row
    pub panicked: usize,
}

/// Dispatcher running one task per record on a bounded worker pool
pub struct JobDispatcher {
    workers: usize,
    processor: Arc<dyn RecordProcessor>,
    sink: Arc<dyn ReportSink>,
    semaphore: Arc<Semaphore>,
    state: Mutex<DispatcherState>,
}

impl JobDispatcher {
    /// Creates a new dispatcher
    ///
    /// # Arguments
    /// * `workers` - Maximum number of records processed at once
    /// * `processor` - Classifies each record
    /// * `sink` - Receives every outcome; must already be open
    pub fn new(
        workers: usize,
        processor: Arc<dyn RecordProcessor>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            workers,
            processor,
            sink,
            semaphore: Arc::new(Semaphore::new(workers)),
            state: Mutex::new(DispatcherState::Idle),
        }
    }

    pub fn state(&self) -> DispatcherState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Processes every record and waits until all tasks have returned
    ///
    /// A dispatcher runs once; a second call is an error.
    pub async fn run(&self, records: Vec<Record>) -> Result<DispatchSummary> {
        self.transition(DispatcherState::Idle, DispatcherState::Running)?;

        info!(
            "Dispatching {} record(s) on {} worker(s)",
            records.len(),
            self.workers
        );

        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::new();
        let mut summary = DispatchSummary::default();
        let mut submit_error = None;

        for record in records {
            // Blocks while every worker is busy
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    submit_error = Some(anyhow!("Worker pool closed: {}", e));
                    break;
                }
            };

            let request = self.processor.request_for(&record);
            let span = info_span!("record", serial = %record.serial);
            let handle = tasks.spawn(
                Self::run_task(
                    record,
                    Arc::clone(&self.processor),
                    Arc::clone(&self.sink),
                    permit,
                )
                .instrument(span),
            );
            in_flight.insert(handle.id(), request);
            summary.submitted += 1;

            while let Some(result) = tasks.try_join_next_with_id() {
                self.reap(result, &mut in_flight, &mut summary);
            }
        }

        debug!("All records submitted, waiting for drain");

        while let Some(result) = tasks.join_next_with_id().await {
            self.reap(result, &mut in_flight, &mut summary);
        }

        self.transition(DispatcherState::Running, DispatcherState::Drained)?;

        info!(
            "Drained: submitted={} completed={} panicked={}",
            summary.submitted, summary.completed, summary.panicked
        );

        match submit_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Runs the pipeline of one record and writes its outcome
    async fn run_task(
        record: Record,
        processor: Arc<dyn RecordProcessor>,
        sink: Arc<dyn ReportSink>,
        _permit: OwnedSemaphorePermit,
    ) {
        let outcome = processor.process(record).await;

        if let Err(e) = sink.record(outcome) {
            error!("Failed to write outcome: {:#}", e);
        }
        // Permit is released when dropped
    }

    /// Accounts for a finished task; a panicked one is reported as an error row
    fn reap(
        &self,
        result: Result<(Id, ()), JoinError>,
        in_flight: &mut HashMap<Id, GenerationRequest>,
        summary: &mut DispatchSummary,
    ) {
        match result {
            Ok((id, ())) => {
                in_flight.remove(&id);
                summary.completed += 1;
            }
            Err(e) => {
                let id = e.id();
                let message = match e.try_into_panic() {
                    Ok(payload) => format!("Record task panicked: {}", panic_message(&*payload)),
                    Err(e) => format!("Record task failed: {}", e),
                };
                warn!("{}", message);
                summary.panicked += 1;

                if let Some(request) = in_flight.remove(&id) {
                    let outcome = Outcome::Error { request, message };
                    if let Err(e) = self.sink.record(outcome) {
                        error!("Failed to write outcome: {:#}", e);
                    }
                }
            }
        }
    }

    fn transition(&self, from: DispatcherState, to: DispatcherState) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("Dispatcher state is poisoned"))?;

        if *state != from {
            anyhow::bail!(
                "Dispatcher cannot move to {:?} from {:?}, expected {:?}",
                to,
                *state,
                from
            );
        }

        *state = to;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JobConfig, ReportPaths};
    use crate::service::{CsvReportSink, LogReportSink, StandardRecordProcessor};
    use crate::testing::{FakeGenerator, FakeStorage, INPUT_BUCKET, job_config, record};
    use async_trait::async_trait;
    use palette_core::domain::request::GenerationSettings;
    use palette_core::dto::report::ErrorRow;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Processor that tracks how many records are in flight
    #[derive(Default)]
    struct SlowProcessor {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl RecordProcessor for SlowProcessor {
        async fn process(&self, record: Record) -> Outcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Outcome::Success {
                request: self.request_for(&record),
            }
        }

        fn request_for(&self, record: &Record) -> GenerationRequest {
            GenerationRequest::for_record(record, &GenerationSettings::default())
        }
    }

    /// Processor that panics on one serial
    struct PanickingProcessor;

    #[async_trait]
    impl RecordProcessor for PanickingProcessor {
        async fn process(&self, record: Record) -> Outcome {
            if record.serial == "bad" {
                panic!("processor bug");
            }
            Outcome::Success {
                request: self.request_for(&record),
            }
        }

        fn request_for(&self, record: &Record) -> GenerationRequest {
            GenerationRequest::for_record(record, &GenerationSettings::default())
        }
    }

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| record(&format!("s{}", i), &format!("videos/{}.mp4", i)))
            .collect()
    }

    /// Every third source missing, every fifth generation failing
    fn mixed_fixture(count: usize) -> (FakeStorage, FakeGenerator) {
        let mut storage = FakeStorage::default();
        let mut generator = FakeGenerator::default();
        for i in 0..count {
            if i % 3 != 0 {
                storage = storage.with_object(INPUT_BUCKET, &format!("videos/{}.mp4", i));
            }
            if i % 5 == 0 {
                generator = generator.failing_for(&format!("s{}", i));
            }
        }
        (storage, generator)
    }

    fn report_paths(dir: &Path) -> ReportPaths {
        ReportPaths {
            success: dir.join("success.csv"),
            skipped: dir.join("skipped.csv"),
            error: dir.join("error.csv"),
            append: false,
        }
    }

    /// Runs the real processor and CSV sink, returning the sorted data rows of each report
    async fn run_to_reports(
        config: JobConfig,
        storage: FakeStorage,
        generator: Arc<FakeGenerator>,
        records: Vec<Record>,
        dir: &Path,
    ) -> (DispatchSummary, [Vec<String>; 3]) {
        let workers = config.workers;
        let processor = Arc::new(StandardRecordProcessor::new(
            Arc::new(config),
            Arc::new(storage),
            generator,
        ));
        let paths = report_paths(dir);
        let sink = Arc::new(CsvReportSink::open(&paths).unwrap());

        let dispatcher = JobDispatcher::new(workers, processor, sink);
        let summary = dispatcher.run(records).await.unwrap();

        let read = |path: &Path| {
            let mut rows: Vec<String> = std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .skip(1)
                .map(str::to_string)
                .collect();
            rows.sort();
            rows
        };

        (
            summary,
            [read(&paths.success), read(&paths.skipped), read(&paths.error)],
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded_by_workers() {
        let processor = Arc::new(SlowProcessor::default());
        let sink = Arc::new(LogReportSink::new());
        let dispatcher = JobDispatcher::new(3, processor.clone(), sink.clone());

        let summary = dispatcher.run(records(20)).await.unwrap();

        assert_eq!(summary.submitted, 20);
        assert_eq!(summary.completed, 20);
        assert!(processor.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert!(processor.max_in_flight.load(Ordering::SeqCst) >= 2);
        assert_eq!(sink.counts().success, 20);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let dispatcher = JobDispatcher::new(
            2,
            Arc::new(SlowProcessor::default()),
            Arc::new(LogReportSink::new()),
        );
        assert_eq!(dispatcher.state(), DispatcherState::Idle);

        dispatcher.run(records(3)).await.unwrap();
        assert_eq!(dispatcher.state(), DispatcherState::Drained);

        // A dispatcher runs once
        assert!(dispatcher.run(records(1)).await.is_err());
        assert_eq!(dispatcher.state(), DispatcherState::Drained);
    }

    #[tokio::test]
    async fn test_empty_input_drains() {
        let sink = Arc::new(LogReportSink::new());
        let dispatcher = JobDispatcher::new(2, Arc::new(SlowProcessor::default()), sink.clone());

        let summary = dispatcher.run(Vec::new()).await.unwrap();

        assert_eq!(summary, DispatchSummary::default());
        assert_eq!(dispatcher.state(), DispatcherState::Drained);
        assert_eq!(sink.counts().total(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_task_does_not_affect_others() {
        let sink = Arc::new(LogReportSink::new());
        let dispatcher = JobDispatcher::new(2, Arc::new(PanickingProcessor), sink.clone());

        let mut input = records(4);
        input.push(record("bad", "videos/bad.mp4"));

        let summary = dispatcher.run(input).await.unwrap();

        assert_eq!(summary.submitted, 5);
        assert_eq!(summary.completed, 4);
        assert_eq!(summary.panicked, 1);
        assert_eq!(sink.counts().success, 4);
        assert_eq!(sink.counts().error, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicked_record_gets_error_row() {
        let dir = tempfile::tempdir().unwrap();
        let paths = report_paths(dir.path());
        let sink = Arc::new(CsvReportSink::open(&paths).unwrap());
        let dispatcher = JobDispatcher::new(2, Arc::new(PanickingProcessor), sink);

        let mut input = records(3);
        input.push(record("bad", "videos/bad.mp4"));
        dispatcher.run(input).await.unwrap();

        let mut reader = csv::Reader::from_path(&paths.error).unwrap();
        let rows: Vec<ErrorRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_serial, "bad");
        assert!(rows[0].error_message.contains("processor bug"));

        let success = std::fs::read_to_string(&paths.success).unwrap();
        assert_eq!(success.lines().count() + rows.len(), 1 + 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_report_rows_sum_to_input_count() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, generator) = mixed_fixture(30);
        let mut config = job_config();
        config.workers = 4;

        let (summary, [success, skipped, error]) = run_to_reports(
            config,
            storage,
            Arc::new(generator),
            records(30),
            dir.path(),
        )
        .await;

        assert_eq!(summary.completed, 30);
        assert_eq!(success.len() + skipped.len() + error.len(), 30);
        // i % 3 == 0 are missing sources: 0, 3, ..., 27
        assert_eq!(skipped.len(), 10);
        // Of the present ones, i % 5 == 0 fail: 5, 10, 20, 25
        assert_eq!(error.len(), 4);
        assert!(
            skipped
                .iter()
                .all(|row| row.ends_with(",InputVideo doesn't exist in sourceURL"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_size_does_not_change_outcomes() {
        let single_dir = tempfile::tempdir().unwrap();
        let pooled_dir = tempfile::tempdir().unwrap();

        let mut single = job_config();
        single.workers = 1;
        let (storage, generator) = mixed_fixture(25);
        let (_, single_rows) =
            run_to_reports(single, storage, Arc::new(generator), records(25), single_dir.path())
                .await;

        let mut pooled = job_config();
        pooled.workers = 8;
        let (storage, generator) = mixed_fixture(25);
        let (_, pooled_rows) =
            run_to_reports(pooled, storage, Arc::new(generator), records(25), pooled_dir.path())
                .await;

        assert_eq!(single_rows, pooled_rows);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dry_run_is_repeatable_and_never_generates() {
        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();

        let mut config = job_config();
        config.dry_run = true;

        let (storage, generator) = mixed_fixture(12);
        let generator = Arc::new(generator);
        let (_, first) = run_to_reports(
            config.clone(),
            storage,
            generator.clone(),
            records(12),
            first_dir.path(),
        )
        .await;
        assert!(generator.requests().is_empty());

        let (storage, generator) = mixed_fixture(12);
        let generator = Arc::new(generator);
        let (_, second) =
            run_to_reports(config, storage, generator.clone(), records(12), second_dir.path())
                .await;
        assert!(generator.requests().is_empty());

        assert_eq!(first, second);
        // Failing generations never happen in a dry run
        assert!(first[2].is_empty());
        assert_eq!(first[0].len(), 8);
    }

    #[tokio::test]
    async fn test_single_record_success_row() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FakeStorage::default().with_object(INPUT_BUCKET, "videos/a.mp4");
        let generator = Arc::new(FakeGenerator::default());

        let (_, [success, skipped, error]) = run_to_reports(
            job_config(),
            storage,
            generator.clone(),
            vec![record("abc123", "videos/a.mp4")],
            dir.path(),
        )
        .await;

        assert_eq!(
            success,
            vec![
                "https://videos-in.s3.ap-southeast-1.amazonaws.com/videos/a.mp4,abc123,60,5,1,\
                 https://palettes-out.s3.ap-southeast-1.amazonaws.com/video-color-palette-extraction/abc123.csv"
                    .to_string()
            ]
        );
        assert!(skipped.is_empty());
        assert!(error.is_empty());
        assert_eq!(generator.requests().len(), 1);
    }
}
