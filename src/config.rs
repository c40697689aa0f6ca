//! Configuration for the annotation pipeline.

use crate::error::PipelineError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input configuration
    pub input: InputConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Checkpoint index parsing
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Annotation backend
    #[serde(default)]
    pub annotator: AnnotatorConfig,
}

/// Line-aligned input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// One document per line
    pub text_path: PathBuf,

    /// One document identifier per line, aligned with `text_path`
    pub ids_path: PathBuf,
}

/// Append-only output files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Processed text, one line per sentence
    pub text_path: PathBuf,

    /// Sentence identifiers, aligned with `text_path`.
    /// Doubles as the checkpoint for resumption.
    pub index_path: PathBuf,
}

/// Processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Records per window
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Concurrent annotation calls within a window
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Explicit start offset. Overrides checkpoint detection when set.
    #[serde(default)]
    pub start_offset: Option<usize>,

    /// Number of Tokio worker threads
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Per-call annotation timeout in seconds
    #[serde(default)]
    pub annotation_timeout_secs: Option<u64>,

    /// Retry configuration for failed annotation calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Enable metrics reporting
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics reporting interval in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,

    /// Optional path to save metrics JSON after run completes
    #[serde(default)]
    pub metrics_output_path: Option<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_workers: default_max_workers(),
            start_offset: None,
            worker_threads: None,
            annotation_timeout_secs: None,
            retry: RetryConfig::default(),
            enable_metrics: true,
            metrics_interval_secs: default_metrics_interval(),
            metrics_output_path: None,
        }
    }
}

/// Retry configuration for failed annotation calls.
///
/// The default of zero retries discards a failed record for the rest of the
/// run; it is picked up again on the next resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first failure
    #[serde(default)]
    pub max_retries: usize,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// How identifier-index lines map back to document identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Marker ending the document part of an identifier (`d1.F0001` -> `d1.F`)
    #[serde(default = "default_boundary_marker")]
    pub boundary_marker: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            boundary_marker: default_boundary_marker(),
        }
    }
}

/// Annotation backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotatorConfig {
    /// Emit each record unchanged as a single sentence.
    #[default]
    Passthrough,

    /// Run an external program once per record.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Config {
    /// Build a configuration with default processing settings.
    pub fn new(input: InputConfig, output: OutputConfig) -> Self {
        Self {
            input,
            output,
            processing: ProcessingConfig::default(),
            checkpoint: CheckpointConfig::default(),
            annotator: AnnotatorConfig::default(),
        }
    }

    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "json" => serde_json::from_str(&contents)?,
            // YAML is a superset of JSON
            _ => serde_yaml::from_str(&contents)?,
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: &str| Err(PipelineError::InvalidConfig(msg.to_string()));

        if self.processing.chunk_size == 0 {
            return invalid("chunk_size must be > 0");
        }
        if self.processing.max_workers == 0 {
            return invalid("max_workers must be > 0");
        }
        if self.processing.worker_threads == Some(0) {
            return invalid("worker_threads must be > 0 when set");
        }
        if self.processing.annotation_timeout_secs == Some(0) {
            return invalid("annotation_timeout_secs must be > 0 when set");
        }
        if self.checkpoint.boundary_marker.is_empty() {
            return invalid("boundary_marker must not be empty");
        }
        if self.output.text_path == self.output.index_path {
            return invalid("output text_path and index_path must differ");
        }
        for input in [&self.input.text_path, &self.input.ids_path] {
            if *input == self.output.text_path || *input == self.output.index_path {
                return invalid("output paths must not overwrite an input file");
            }
        }
        if let AnnotatorConfig::Command { program, .. } = &self.annotator {
            if program.trim().is_empty() {
                return invalid("annotator program must not be empty");
            }
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_chunk_size() -> usize { 1000 }
fn default_max_workers() -> usize { num_cpus::get() }
fn default_true() -> bool { true }
fn default_metrics_interval() -> u64 { 30 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 30_000 }
fn default_boundary_marker() -> String { ".F".to_string() }

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::new(
            InputConfig {
                text_path: "input/documents.txt".into(),
                ids_path: "input/document_ids.txt".into(),
            },
            OutputConfig {
                text_path: "parsed/documents.txt".into(),
                index_path: "parsed/document_ids.txt".into(),
            },
        )
    }

    #[test]
    fn test_default_processing() {
        let processing = ProcessingConfig::default();
        assert_eq!(processing.chunk_size, 1000);
        assert!(processing.max_workers > 0);
        assert!(processing.start_offset.is_none());
        assert_eq!(processing.retry.max_retries, 0);
    }

    #[test]
    fn test_config_validation_ok() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_chunk_size() {
        let mut config = test_config();
        config.processing.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_validation_shared_output_paths() {
        let mut config = test_config();
        config.output.index_path = config.output.text_path.clone();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.output.text_path = config.input.text_path.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml_defaults() {
        let yaml = r#"
input:
  text_path: in/docs.txt
  ids_path: in/ids.txt
output:
  text_path: out/docs.txt
  index_path: out/ids.txt
processing:
  chunk_size: 2
  max_workers: 4
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.processing.chunk_size, 2);
        assert_eq!(config.processing.max_workers, 4);
        assert_eq!(config.checkpoint.boundary_marker, ".F");
        assert_eq!(config.annotator, AnnotatorConfig::Passthrough);
        assert!(config.processing.enable_metrics);
    }

    #[test]
    fn test_config_command_annotator_json() {
        let json = r#"{
            "input": {"text_path": "a.txt", "ids_path": "b.txt"},
            "output": {"text_path": "c.txt", "index_path": "d.txt"},
            "annotator": {"kind": "command", "program": "annotate", "args": ["--fast"]}
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(
            config.annotator,
            AnnotatorConfig::Command {
                program: "annotate".to_string(),
                args: vec!["--fast".to_string()],
            }
        );
    }

    #[test]
    fn test_config_yaml_roundtrip_preserves_start_offset() {
        let mut config = test_config();
        config.processing.start_offset = Some(42);
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.processing.start_offset, Some(42));
    }
}
