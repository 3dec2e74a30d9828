//! Service layer
//!
//! Services contain the business logic of a run: classifying records and
//! persisting their outcomes.
//!
//! All services are trait-based to enable testing and dependency injection.

mod processor;
mod report;

// Re-export traits
pub use processor::RecordProcessor;
pub use report::ReportSink;

// Re-export implementations
pub use processor::StandardRecordProcessor;
pub use report::{CsvReportSink, LogReportSink, ReportCounts};
