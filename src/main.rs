//! Parse Pipeline CLI
//!
//! Resumable chunked annotation of line-oriented document collections.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parse_pipeline::index::count_reprocessed;
use parse_pipeline::{annotate, build_runtime, plan_resume, run_pipeline, Config};

#[derive(Parser)]
#[command(name = "parse-pipeline")]
#[command(about = "Annotate large document collections in resumable chunks", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Override records per window
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Override concurrent annotation calls per window
    #[arg(long, global = true)]
    max_workers: Option<usize>,

    /// Start at this record offset instead of resuming from the checkpoint
    #[arg(long, global = true)]
    start_offset: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline (default if no command specified)
    Run,

    /// Report where a run would resume without processing anything
    Status,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run_command(config)?;
        }

        Some(Commands::Status) => {
            let config = load_config(&cli)?;
            status_command(&config)?;
        }

        Some(Commands::Validate) => {
            load_config(&cli)?;
            println!("Configuration is valid");
        }

        Some(Commands::GenerateConfig { ref output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_file(&cli.config)?;

    if let Some(chunk_size) = cli.chunk_size {
        config.processing.chunk_size = chunk_size;
    }
    if let Some(max_workers) = cli.max_workers {
        config.processing.max_workers = max_workers;
    }
    if let Some(start_offset) = cli.start_offset {
        config.processing.start_offset = Some(start_offset);
    }

    config.validate()?;
    Ok(config)
}

fn run_command(config: Config) -> Result<()> {
    let annotator = annotate::from_config(&config.annotator);

    let runtime = build_runtime(config.processing.worker_threads)?;
    runtime.block_on(async { run_pipeline(config, annotator).await })?;

    Ok(())
}

fn status_command(config: &Config) -> Result<()> {
    let (records, checkpoint, plan) = plan_resume(config)?;
    let chunk_size = config.processing.chunk_size;

    println!("\n=== Resume Status ===");
    println!("Input records: {}", records.len());
    if checkpoint.is_fresh() {
        println!("Checkpoint: none (outputs will be initialized)");
    } else {
        println!(
            "Checkpoint: {} index lines, {} documents",
            checkpoint.line_count(),
            checkpoint.len()
        );
    }
    println!("Start offset: {} ({:?})", plan.start_offset, plan.source);
    println!("Remaining records: {}", plan.remaining());
    println!(
        "Remaining windows: {} of up to {} records",
        plan.remaining().div_ceil(chunk_size),
        chunk_size
    );
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let ahead = count_reprocessed(
        &ids,
        checkpoint.prefixes(),
        plan.start_offset,
        &config.checkpoint.boundary_marker,
    );
    if ahead > 0 {
        println!(
            "Note: {} documents past the first gap are in the checkpoint and will be processed again",
            ahead
        );
    }
    println!("=====================\n");

    Ok(())
}

fn generate_config_command(output: &Path) -> Result<()> {
    let yaml = r#"# Parse Pipeline Configuration

# === INPUT: line-aligned documents and identifiers ===
input:
  # One document per line
  text_path: "data/input/documents.txt"
  # One identifier per line, same line count as text_path
  ids_path: "data/input/document_ids.txt"

# === OUTPUT: append-only results ===
output:
  # Processed sentences, one per line
  text_path: "data/processed/parsed/documents.txt"
  # Sentence identifiers, one per line. Also the resume checkpoint.
  index_path: "data/processed/parsed/document_ids.txt"

# === PROCESSING ===
processing:
  # Records per window. Windows run one at a time.
  chunk_size: 1000

  # Concurrent annotation calls within a window
  max_workers: 8

  # Start at this record offset instead of resuming from the checkpoint
  # start_offset: 0

  # Tokio worker threads (null = num CPUs)
  # worker_threads: 8

  # Fail annotation calls that take longer than this
  # annotation_timeout_secs: 600

  # Retries for failed annotation calls. With 0, failed records are left for
  # the next run.
  retry:
    max_retries: 0
    initial_backoff_ms: 500
    max_backoff_ms: 30000

  enable_metrics: true
  metrics_interval_secs: 30
  # metrics_output_path: "metrics.json"

# === CHECKPOINT ===
checkpoint:
  # Identifier index lines are truncated after this marker to recover the
  # document identifier (d1.F0001_0 -> d1.F)
  boundary_marker: ".F"

# === ANNOTATOR ===
annotator:
  kind: passthrough
  # kind: command
  # program: "annotate-document"
  # args: ["--annotators", "tokenize,ssplit,pos,lemma,ner,depparse"]
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_default() {
        // No subcommand - should default to Run
        let cli = Cli::try_parse_from(["parse-pipeline"]);
        assert!(cli.is_ok());
        assert!(cli.unwrap().command.is_none());
    }

    #[test]
    fn test_cli_parse_overrides() {
        let cli = Cli::try_parse_from([
            "parse-pipeline",
            "run",
            "--chunk-size",
            "2",
            "--max-workers",
            "4",
            "--start-offset",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size, Some(2));
        assert_eq!(cli.max_workers, Some(4));
        assert_eq!(cli.start_offset, Some(10));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::try_parse_from(["parse-pipeline", "status", "-c", "test.json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn test_generated_config_parses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        generate_config_command(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.processing.chunk_size, 1000);
    }
}
