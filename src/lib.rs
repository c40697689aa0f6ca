//! Parse Pipeline
//!
//! Resumable pipeline that runs a large line-oriented document collection
//! through a slow annotation service, writing processed sentences and a
//! parallel sentence-identifier index.
//!
//! # Architecture
//!
//! The pipeline consists of:
//!
//! - **I/O**: Line-aligned record loading and the append-only result writer
//! - **Index**: Checkpoint recovery from the identifier index and resume offsets
//! - **Annotate**: The annotation service interface and its backends
//! - **Pipeline**: Window-by-window scheduling with bounded concurrency and metrics
//!
//! A run that is interrupted can simply be started again: the identifier
//! index written so far tells the next run where to continue.
//!
//! # Usage
//!
//! ```no_run
//! use parse_pipeline::{annotate, run_pipeline, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml".as_ref())?;
//!     let annotator = annotate::from_config(&config.annotator);
//!     run_pipeline(config, annotator).await?;
//!     Ok(())
//! }
//! ```

pub mod annotate;
pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod pipeline;

pub use annotate::{AnnotationOutput, Annotator};
pub use config::Config;
pub use error::{AnnotationError, PipelineError};
pub use index::{Checkpoint, ResumePlan};
pub use io::{Record, ResultWriter};
pub use pipeline::{Metrics, RecordProcessor, Scheduler, SchedulerConfig, SchedulerStats};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Load the inputs and checkpoint and work out where a run would start.
pub fn plan_resume(config: &Config) -> Result<(Vec<Record>, Checkpoint, ResumePlan)> {
    let records = io::record_source::load(&config.input.text_path, &config.input.ids_path)?;

    let marker = &config.checkpoint.boundary_marker;
    let checkpoint = index::load_processed_prefixes(&config.output.index_path, marker)?;
    let plan = ResumePlan::resolve(
        &records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        &checkpoint,
        config.processing.start_offset,
        marker,
    );

    Ok((records, checkpoint, plan))
}

/// Run the full pipeline with the given configuration and annotator.
pub async fn run_pipeline(config: Config, annotator: Arc<dyn Annotator>) -> Result<SchedulerStats> {
    config.validate()?;

    tracing::info!("Starting parse pipeline with {} annotator", annotator.name());

    let (records, checkpoint, plan) = plan_resume(&config)?;
    tracing::info!("{}", plan);

    let mut writer = ResultWriter::open(
        &config.output.text_path,
        &config.output.index_path,
        checkpoint.is_fresh(),
    )
    .await?;

    let metrics = Metrics::new();
    let processor = Arc::new(
        RecordProcessor::new(annotator, metrics.clone())
            .with_timeout(config.processing.annotation_timeout_secs.map(Duration::from_secs))
            .with_retry(config.processing.retry.clone()),
    );

    let scheduler_config = SchedulerConfig {
        chunk_size: config.processing.chunk_size,
        max_workers: config.processing.max_workers,
        enable_metrics: config.processing.enable_metrics,
        metrics_interval_secs: config.processing.metrics_interval_secs,
        metrics_output_path: config.processing.metrics_output_path.clone(),
    };

    let scheduler = Scheduler::new(processor, metrics, scheduler_config);
    let stats = scheduler.run(&records, plan.start_offset, &mut writer).await?;

    writer.close().await?;

    tracing::info!("Pipeline complete: {}", stats);

    Ok(stats)
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}
