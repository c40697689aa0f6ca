//! Append-only writer for processed text and the identifier index.

use crate::annotate::AnnotationOutput;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writer for the two output files.
///
/// Both files are opened in append mode so a resumed run extends the output
/// of earlier runs. Each [`append`](Self::append) writes one record's text
/// and identifier lines and flushes both files before returning.
pub struct ResultWriter {
    text: BufWriter<File>,
    index: BufWriter<File>,
    text_path: PathBuf,
    index_path: PathBuf,
    records_written: u64,
    text_lines_written: u64,
    index_lines_written: u64,
}

impl ResultWriter {
    /// Open both outputs, truncating them first when `fresh` is set.
    pub async fn open(text_path: &Path, index_path: &Path, fresh: bool) -> Result<Self> {
        for path in [text_path, index_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        if fresh {
            tracing::info!(
                "Initializing empty outputs {} and {}",
                text_path.display(),
                index_path.display()
            );
        }

        Ok(Self {
            text: BufWriter::new(open_output(text_path, fresh).await?),
            index: BufWriter::new(open_output(index_path, fresh).await?),
            text_path: text_path.to_path_buf(),
            index_path: index_path.to_path_buf(),
            records_written: 0,
            text_lines_written: 0,
            index_lines_written: 0,
        })
    }

    /// Append one record's output. Returns `false` if the output was empty and
    /// nothing was written.
    pub async fn append(&mut self, record_id: &str, output: &AnnotationOutput) -> Result<bool> {
        if output.is_empty() {
            tracing::debug!("Record {} produced no sentences, nothing written", record_id);
            return Ok(false);
        }

        // Nothing reaches the files unless both get the same number of lines
        output
            .check_aligned()
            .with_context(|| format!("Refusing to write record {}", record_id))?;

        let text = output.text_lines();
        let text_lines = text.lines().count() as u64;
        let index_lines = output.sub_ids.len() as u64;

        let mut lines = String::with_capacity(text.len() + 1);
        lines.push_str(text);
        lines.push('\n');
        let mut ids = output.sub_ids.join("\n");
        ids.push('\n');

        self.text
            .write_all(lines.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.text_path.display()))?;
        self.index
            .write_all(ids.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.index_path.display()))?;

        self.flush().await?;

        self.records_written += 1;
        self.text_lines_written += text_lines;
        self.index_lines_written += index_lines;
        Ok(true)
    }

    async fn flush(&mut self) -> Result<()> {
        self.text
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.text_path.display()))?;
        self.index
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", self.index_path.display()))?;
        Ok(())
    }

    /// Records appended by this writer.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Lines appended to the text output by this writer.
    pub fn text_lines_written(&self) -> u64 {
        self.text_lines_written
    }

    /// Lines appended to the identifier index by this writer.
    pub fn index_lines_written(&self) -> u64 {
        self.index_lines_written
    }

    /// Flush and sync both files to disk.
    pub async fn close(mut self) -> Result<()> {
        self.flush().await?;
        self.text.get_ref().sync_all().await?;
        self.index.get_ref().sync_all().await?;
        Ok(())
    }
}

async fn open_output(path: &Path, truncate: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    if truncate {
        options.write(true).create(true).truncate(true);
    } else {
        options.append(true).create(true);
    }
    options
        .open(path)
        .await
        .with_context(|| format!("Failed to open output {}", path.display()))
}
