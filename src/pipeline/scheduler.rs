//! Window-by-window scheduling of annotation work.
//!
//! Records after the start offset are split into consecutive windows of at
//! most `chunk_size`. Windows run strictly one after another; inside a window
//! up to `max_workers` records are annotated concurrently and their results
//! are written as they complete. Output order within a window therefore
//! follows completion order, not input order.

use crate::error::AnnotationError;
use crate::io::{Record, ResultWriter};
use crate::pipeline::{Metrics, MetricsReporter, ProcessedRecord, RecordProcessor};
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Records per window
    pub chunk_size: usize,

    /// Concurrent annotation calls within a window
    pub max_workers: usize,

    /// Enable progress reporting
    pub enable_metrics: bool,

    /// Metrics reporting interval in seconds
    pub metrics_interval_secs: u64,

    /// Optional path to save metrics JSON after run completes
    pub metrics_output_path: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            max_workers: 16,
            enable_metrics: true,
            metrics_interval_secs: 30,
            metrics_output_path: None,
        }
    }
}

/// A contiguous slice of the record sequence.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// 1-based window number, counting the windows before the start offset
    pub number: usize,

    /// Offset of the first record in the full sequence
    pub start: usize,

    pub records: &'a [Record],
}

impl Window<'_> {
    /// Offset one past the last record.
    pub fn end(&self) -> usize {
        self.start + self.records.len()
    }
}

/// Split `records[start_offset..]` into windows of at most `chunk_size`.
///
/// A `chunk_size` of zero is treated as one.
pub fn windows(records: &[Record], start_offset: usize, chunk_size: usize) -> impl Iterator<Item = Window<'_>> {
    let chunk_size = chunk_size.max(1);
    let start_offset = start_offset.min(records.len());
    let skipped = start_offset / chunk_size;
    records[start_offset..]
        .chunks(chunk_size)
        .enumerate()
        .map(move |(i, records)| Window {
            number: skipped + i + 1,
            start: start_offset + i * chunk_size,
            records,
        })
}

/// Counts for one drained window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    pub written: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Scheduler driving the window loop.
pub struct Scheduler {
    /// Per-record processor
    processor: Arc<RecordProcessor>,

    /// Metrics
    metrics: Arc<Metrics>,

    /// Configuration
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(processor: Arc<RecordProcessor>, metrics: Arc<Metrics>, config: SchedulerConfig) -> Self {
        Self {
            processor,
            metrics,
            config,
        }
    }

    /// Process every record from `start_offset` to the end of `records`.
    ///
    /// Only output I/O errors abort the run; annotation failures are counted
    /// and the affected records are skipped.
    pub async fn run(
        &self,
        records: &[Record],
        start_offset: usize,
        writer: &mut ResultWriter,
    ) -> Result<SchedulerStats> {
        let start_offset = start_offset.min(records.len());
        let remaining = records.len() - start_offset;

        tracing::info!(
            "Scheduling {} records in windows of {} ({} concurrent)",
            remaining,
            self.config.chunk_size.max(1),
            self.config.max_workers.max(1)
        );

        // Start metrics reporter if enabled
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let reporter_handle = if self.config.enable_metrics {
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                self.config.metrics_interval_secs,
                remaining as u64,
            );
            Some(tokio::spawn(reporter.run(shutdown_rx)))
        } else {
            drop(shutdown_rx);
            None
        };

        let mut stats = SchedulerStats {
            total_records: records.len(),
            start_offset,
            ..Default::default()
        };

        let result = self.run_windows(records, start_offset, writer, &mut stats).await;

        // Shutdown metrics reporter
        let _ = shutdown_tx.send(()).await;
        if let Some(handle) = reporter_handle {
            let _ = handle.await;
        }
        result?;

        if self.config.enable_metrics {
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                self.config.metrics_interval_secs,
                remaining as u64,
            );
            reporter.print_summary();

            if let Some(ref path) = self.config.metrics_output_path {
                let snapshot = self.metrics.snapshot();
                if let Err(e) = snapshot.save_to_file(path) {
                    tracing::warn!("Failed to save metrics to {}: {}", path, e);
                }
            }
        }

        Ok(stats)
    }

    async fn run_windows(
        &self,
        records: &[Record],
        start_offset: usize,
        writer: &mut ResultWriter,
        stats: &mut SchedulerStats,
    ) -> Result<()> {
        for window in windows(records, start_offset, self.config.chunk_size) {
            let window_stats = self.run_window(window, writer).await?;

            stats.windows += 1;
            stats.records_written += window_stats.written;
            stats.records_empty += window_stats.empty;
            stats.records_failed += window_stats.failed;
            self.metrics.add_window_completed();

            tracing::info!(
                "Processed chunk {} at {}",
                window.number,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
            );
        }
        stats.text_lines_written = writer.text_lines_written();
        stats.index_lines_written = writer.index_lines_written();
        Ok(())
    }

    /// Annotate one window and write its successes in completion order.
    ///
    /// Returns only after every record of the window has settled.
    pub async fn run_window(&self, window: Window<'_>, writer: &mut ResultWriter) -> Result<WindowStats> {
        let mut stats = WindowStats::default();

        let mut completed = stream::iter(window.records.iter().cloned())
            .map(|record| {
                let processor = self.processor.clone();
                let id = record.id.clone();
                async move {
                    match tokio::spawn(async move { processor.process(record).await }).await {
                        Ok(processed) => processed,
                        Err(e) => {
                            tracing::warn!("Annotation task for record {} aborted: {}", id, e);
                            ProcessedRecord {
                                id,
                                outcome: Err(AnnotationError::TaskAborted(e.to_string())),
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.config.max_workers.max(1));

        while let Some(processed) = completed.next().await {
            match processed.outcome {
                Ok(output) => {
                    let write_start = Instant::now();
                    let text_before = writer.text_lines_written();
                    let index_before = writer.index_lines_written();
                    if writer.append(&processed.id, &output).await? {
                        stats.written += 1;
                        self.metrics.add_record_processed(
                            writer.text_lines_written() - text_before,
                            writer.index_lines_written() - index_before,
                        );
                    } else {
                        stats.empty += 1;
                        self.metrics.add_record_empty();
                    }
                    self.metrics.add_write_time(write_start.elapsed());
                }
                Err(_) => {
                    stats.failed += 1;
                    self.metrics.add_record_failed();
                }
            }
        }

        Ok(stats)
    }
}

/// Statistics from a scheduler run.
#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    /// Records in the input
    pub total_records: usize,

    /// Offset the run started from
    pub start_offset: usize,

    /// Windows processed
    pub windows: usize,

    /// Records whose output was written
    pub records_written: usize,

    /// Records that annotated to nothing
    pub records_empty: usize,

    /// Records whose annotation failed
    pub records_failed: usize,

    /// Lines appended to the text output
    pub text_lines_written: u64,

    /// Lines appended to the identifier index
    pub index_lines_written: u64,
}

impl std::fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Windows: {}, Written: {}, Empty: {}, Failed: {}, Started at: {}/{}",
            self.windows,
            self.records_written,
            self.records_empty,
            self.records_failed,
            self.start_offset,
            self.total_records
        )
    }
}
