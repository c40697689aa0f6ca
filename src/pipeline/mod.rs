//! Pipeline orchestration for window processing.

mod metrics;
mod record_processor;
mod scheduler;


pub use metrics::{Metrics, MetricsReporter, MetricsSnapshot};
pub use record_processor::{ProcessedRecord, RecordOutcome, RecordProcessor};
pub use scheduler::{windows, Scheduler, SchedulerConfig, SchedulerStats, Window, WindowStats};
