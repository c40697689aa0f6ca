//! Checkpoint state recovered from the identifier-index output.
//!
//! There is no separate progress file: every line of the index names a
//! sentence of a document that was written to the text output, so the set of
//! document prefixes found there is the set of documents already processed.

use crate::error::PipelineError;
use std::collections::HashSet;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

/// Truncate an identifier after the first occurrence of `marker`.
///
/// Identifiers without the marker are returned whole.
pub fn document_prefix<'a>(id: &'a str, marker: &str) -> &'a str {
    match id.find(marker) {
        Some(pos) => &id[..pos + marker.len()],
        None => id,
    }
}

/// Documents recorded in a previous run's identifier index.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    prefixes: HashSet<String>,
    lines: usize,
    fresh: bool,
}

impl Checkpoint {
    /// Checkpoint for a run with no prior output.
    pub fn fresh() -> Self {
        Self {
            fresh: true,
            ..Default::default()
        }
    }

    /// Build from in-memory index lines.
    pub fn from_lines<I, S>(lines: I, marker: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut checkpoint = Self::default();
        for line in lines {
            checkpoint.insert_line(line.as_ref(), marker);
        }
        checkpoint
    }

    fn insert_line(&mut self, line: &str, marker: &str) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        self.lines += 1;
        self.prefixes
            .insert(document_prefix(line, marker).to_string());
    }

    /// Whether the index file was absent.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Document prefixes seen in the index.
    pub fn prefixes(&self) -> &HashSet<String> {
        &self.prefixes
    }

    /// Non-empty lines read from the index.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains(prefix)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Read the identifier index at `index_path`.
///
/// A missing file is a fresh start. Any other read failure, including a line
/// that is not valid UTF-8, is fatal so that a damaged index is never mistaken
/// for an empty one.
pub fn load_processed_prefixes(index_path: &Path, marker: &str) -> Result<Checkpoint, PipelineError> {
    let read_error = |source| PipelineError::CheckpointRead {
        path: index_path.to_path_buf(),
        source,
    };

    let file = match std::fs::File::open(index_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(
                "No checkpoint index at {}, starting fresh",
                index_path.display()
            );
            return Ok(Checkpoint::fresh());
        }
        Err(e) => return Err(read_error(e)),
    };

    let mut checkpoint = Checkpoint::default();
    for line in BufReader::new(file).lines() {
        checkpoint.insert_line(&line.map_err(read_error)?, marker);
    }

    tracing::info!(
        "Loaded checkpoint from {}: {} lines, {} documents",
        index_path.display(),
        checkpoint.line_count(),
        checkpoint.len()
    );

    Ok(checkpoint)
}
