//! Throughput monitoring and metrics collection.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Records whose output was written
    pub records_processed: AtomicU64,

    /// Records whose annotation failed and were discarded
    pub records_failed: AtomicU64,

    /// Records that annotated to nothing
    pub records_empty: AtomicU64,

    /// Annotation attempts repeated after a failure
    pub records_retried: AtomicU64,

    /// Windows fully drained
    pub windows_completed: AtomicU64,

    /// Lines appended to the text output
    pub text_lines_written: AtomicU64,

    /// Lines appended to the identifier index
    pub index_lines_written: AtomicU64,

    /// Start time
    start_time: Option<Instant>,

    /// Time spent in annotation calls (microseconds, summed across workers)
    pub annotate_us: AtomicU64,

    /// Time spent appending output (microseconds)
    pub write_us: AtomicU64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        })
    }

    /// Record a written record and its line counts.
    pub fn add_record_processed(&self, text_lines: u64, index_lines: u64) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
        self.text_lines_written.fetch_add(text_lines, Ordering::Relaxed);
        self.index_lines_written.fetch_add(index_lines, Ordering::Relaxed);
    }

    /// Record a failed record.
    pub fn add_record_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an empty annotation result.
    pub fn add_record_empty(&self) {
        self.records_empty.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retried annotation attempt.
    pub fn add_retry(&self) {
        self.records_retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a drained window.
    pub fn add_window_completed(&self) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent in an annotation call.
    pub fn add_annotate_time(&self, duration: Duration) {
        self.annotate_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record time spent writing output.
    pub fn add_write_time(&self, duration: Duration) {
        self.write_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Records settled (written, empty or failed) so far.
    pub fn records_settled(&self) -> u64 {
        self.records_processed.load(Ordering::Relaxed)
            + self.records_empty.load(Ordering::Relaxed)
            + self.records_failed.load(Ordering::Relaxed)
    }

    /// Get settled records per second.
    pub fn records_per_second(&self) -> f64 {
        let records = self.records_settled();
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            records as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_processed: self.records_processed.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_empty: self.records_empty.load(Ordering::Relaxed),
            records_retried: self.records_retried.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            text_lines_written: self.text_lines_written.load(Ordering::Relaxed),
            index_lines_written: self.index_lines_written.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            records_per_second: self.records_per_second(),
            annotate_secs: self.annotate_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            write_secs: self.write_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub records_processed: u64,
    pub records_failed: u64,
    pub records_empty: u64,
    pub records_retried: u64,
    pub windows_completed: u64,
    pub text_lines_written: u64,
    pub index_lines_written: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub records_per_second: f64,
    /// Total time spent in annotation calls (seconds, summed across workers)
    pub annotate_secs: f64,
    /// Total time spent appending output (seconds)
    pub write_secs: f64,
}

impl MetricsSnapshot {
    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path);
        Ok(())
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {} written, {} empty, {} failed, {} retries | Windows: {} | \
             Lines: {} text / {} index | Rate: {:.1} records/s | Elapsed: {:.1}s",
            self.records_processed,
            self.records_empty,
            self.records_failed,
            self.records_retried,
            self.windows_completed,
            self.text_lines_written,
            self.index_lines_written,
            self.records_per_second,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// Periodic metrics reporter.
pub struct MetricsReporter {
    metrics: Arc<Metrics>,
    interval_secs: u64,
    total_records: u64,
}

impl MetricsReporter {
    /// Create a new metrics reporter.
    pub fn new(metrics: Arc<Metrics>, interval_secs: u64, total_records: u64) -> Self {
        Self {
            metrics,
            interval_secs,
            total_records,
        }
    }

    /// Start the periodic reporter.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.metrics.snapshot();
                    tracing::info!("[{:.1}%] {}", self.progress(&snapshot), snapshot);
                }
                _ = shutdown.recv() => {
                    let snapshot = self.metrics.snapshot();
                    tracing::info!("Final: {}", snapshot);
                    break;
                }
            }
        }
    }

    fn progress(&self, snapshot: &MetricsSnapshot) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        let settled = snapshot.records_processed + snapshot.records_empty + snapshot.records_failed;
        settled as f64 / self.total_records as f64 * 100.0
    }

    /// Print a final summary.
    pub fn print_summary(&self) {
        let snapshot = self.metrics.snapshot();

        println!("\n=== Pipeline Summary ===");
        println!("Total time: {:.1}s", snapshot.elapsed.as_secs_f64());
        println!("Windows completed: {}", snapshot.windows_completed);
        println!("Records written: {}", snapshot.records_processed);
        println!("Records empty: {}", snapshot.records_empty);
        println!("Records failed: {}", snapshot.records_failed);
        println!("Retries: {}", snapshot.records_retried);
        println!("Text lines written: {}", snapshot.text_lines_written);
        println!("Index lines written: {}", snapshot.index_lines_written);
        println!("Processing rate: {:.1} records/s", snapshot.records_per_second);
        println!("Annotation time: {:.1}s (summed across workers)", snapshot.annotate_secs);
        println!("Write time: {:.1}s", snapshot.write_secs);
        if snapshot.records_failed > 0 {
            println!(
                "Note: {} failed records will be picked up again on the next run",
                snapshot.records_failed
            );
        }
        println!("========================\n");
    }
}
