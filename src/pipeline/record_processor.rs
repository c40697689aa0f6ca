//! Per-record unit of work.

use crate::annotate::{AnnotationOutput, Annotator};
use crate::config::RetryConfig;
use crate::error::AnnotationError;
use crate::io::Record;
use crate::pipeline::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of annotating one record.
pub type RecordOutcome = Result<AnnotationOutput, AnnotationError>;

/// A record's identifier together with its outcome.
#[derive(Debug)]
pub struct ProcessedRecord {
    pub id: String,
    pub outcome: RecordOutcome,
}

/// Annotates single records, converting every failure into a
/// [`RecordOutcome`] instead of propagating it.
pub struct RecordProcessor {
    annotator: Arc<dyn Annotator>,
    metrics: Arc<Metrics>,
    timeout: Option<Duration>,
    retry: RetryConfig,
}

impl RecordProcessor {
    pub fn new(annotator: Arc<dyn Annotator>, metrics: Arc<Metrics>) -> Self {
        Self {
            annotator,
            metrics,
            timeout: None,
            retry: RetryConfig::default(),
        }
    }

    /// Fail calls that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry failed calls according to `retry`.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Annotate `record`, retrying as configured.
    ///
    /// A final failure is logged with the record's identifier.
    pub async fn process(&self, record: Record) -> ProcessedRecord {
        let mut attempt = 0;
        let mut backoff = self.retry.initial_backoff_ms;

        let outcome = loop {
            match self.annotate_once(&record).await {
                Ok(output) => break Ok(output),
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    self.metrics.add_retry();
                    tracing::warn!(
                        "Record {} attempt {} failed: {}, retrying in {}ms",
                        record.id,
                        attempt,
                        e,
                        backoff
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    backoff = next_backoff(backoff, self.retry.max_backoff_ms);
                }
                Err(e) => {
                    tracing::warn!("Annotation failed for record {}: {}", record.id, e);
                    break Err(e);
                }
            }
        };

        ProcessedRecord {
            id: record.id,
            outcome,
        }
    }

    async fn annotate_once(&self, record: &Record) -> RecordOutcome {
        let start = Instant::now();
        let call = self.annotator.annotate(&record.text, &record.id);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(AnnotationError::Timeout(limit)),
            },
            None => call.await,
        };
        self.metrics.add_annotate_time(start.elapsed());

        let output = result?;
        if !output.is_empty() {
            output.check_aligned()?;
        }
        Ok(output)
    }
}

/// Doubling backoff capped at `max_ms`.
fn next_backoff(current_ms: u64, max_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(max_ms)
}
