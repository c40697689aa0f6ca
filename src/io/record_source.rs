//! Line-aligned document input.

use crate::error::PipelineError;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// One document and its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub text: String,
    pub id: String,
}

impl Record {
    pub fn new(text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: id.into(),
        }
    }
}

/// Load records from a text file and an identifier file.
///
/// Line N of each file describes the same document. The files must have the
/// same number of lines. Both files are read line by line.
pub fn load(text_path: &Path, id_path: &Path) -> Result<Vec<Record>> {
    let texts = open_lines(text_path)
        .with_context(|| format!("Failed to read documents from {}", text_path.display()))?;
    let ids = open_lines(id_path)
        .with_context(|| format!("Failed to read document ids from {}", id_path.display()))?;

    let records = zip_lines(
        texts.map(|line| {
            line.with_context(|| format!("Failed to read documents from {}", text_path.display()))
        }),
        ids.map(|line| {
            line.with_context(|| format!("Failed to read document ids from {}", id_path.display()))
        }),
    )?;
    tracing::info!(
        "Loaded {} records from {}",
        records.len(),
        text_path.display()
    );
    Ok(records)
}

/// Zip document lines with identifier lines held in memory.
pub fn pair_lines(texts: &str, ids: &str) -> Result<Vec<Record>> {
    zip_lines(
        texts.lines().map(|line| Ok(line.to_string())),
        ids.lines().map(|line| Ok(line.to_string())),
    )
}

fn open_lines(path: &Path) -> std::io::Result<Lines<BufReader<File>>> {
    Ok(BufReader::new(File::open(path)?).lines())
}

/// Pair lines in lockstep. On a count mismatch the longer side is drained
/// so the error reports both totals.
fn zip_lines<T, I>(mut texts: T, mut ids: I) -> Result<Vec<Record>>
where
    T: Iterator<Item = Result<String>>,
    I: Iterator<Item = Result<String>>,
{
    let mut records = Vec::new();
    loop {
        let next = (texts.next().transpose()?, ids.next().transpose()?);
        match next {
            (Some(text), Some(id)) => records.push(Record::new(text, id.trim())),
            (None, None) => return Ok(records),
            (text, id) => {
                let paired = records.len();
                let texts = paired + usize::from(text.is_some()) + count_rest(texts)?;
                let ids = paired + usize::from(id.is_some()) + count_rest(ids)?;
                return Err(PipelineError::CountMismatch { texts, ids }.into());
            }
        }
    }
}

fn count_rest<L: Iterator<Item = Result<String>>>(lines: L) -> Result<usize> {
    let mut n = 0;
    for line in lines {
        line?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pair_lines() {
        let records = pair_lines("first doc\nsecond doc\n", "d1.F0001\nd2.F0001\n").unwrap();
        assert_eq!(
            records,
            vec![
                Record::new("first doc", "d1.F0001"),
                Record::new("second doc", "d2.F0001"),
            ]
        );
    }

    #[test]
    fn test_pair_lines_keeps_empty_documents() {
        let records = pair_lines("a\n\nc\n", "d1\nd2\nd3\n").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].text, "");
    }

    #[test]
    fn test_pair_lines_crlf() {
        let records = pair_lines("a\r\nb\r\n", "d1 \r\nd2\r\n").unwrap();
        assert_eq!(records[0], Record::new("a", "d1"));
        assert_eq!(records[1], Record::new("b", "d2"));
    }

    #[test]
    fn test_count_mismatch() {
        let err = pair_lines("a\nb\nc\n", "d1\nd2\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::CountMismatch { texts: 3, ids: 2 })
        ));

        let err = pair_lines("a\n", "d1\nd2\nd3\nd4\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::CountMismatch { texts: 1, ids: 4 })
        ));
    }

    #[test]
    fn test_load_from_files() {
        let dir = TempDir::new().unwrap();
        let text_path = dir.path().join("documents.txt");
        let id_path = dir.path().join("document_ids.txt");
        std::fs::write(&text_path, "one\ntwo").unwrap();
        std::fs::write(&id_path, "d1.F0001\nd2.F0001\n").unwrap();

        let records = load(&text_path, &id_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], Record::new("two", "d2.F0001"));
    }

    #[test]
    fn test_load_mismatch_downcasts() {
        let dir = TempDir::new().unwrap();
        let text_path = dir.path().join("documents.txt");
        let id_path = dir.path().join("document_ids.txt");
        std::fs::write(&text_path, "one\ntwo\n").unwrap();
        std::fs::write(&id_path, "d1.F0001\n").unwrap();

        let err = load(&text_path, &id_path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::CountMismatch { texts: 2, ids: 1 })
        ));
    }

    #[test]
    fn test_load_crlf_and_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let text_path = dir.path().join("documents.txt");
        let id_path = dir.path().join("document_ids.txt");
        std::fs::write(&text_path, "one\r\ntwo\r\n").unwrap();
        std::fs::write(&id_path, "d1.F0001\r\nd2.F0001\r\n").unwrap();
        let records = load(&text_path, &id_path).unwrap();
        assert_eq!(records[0], Record::new("one", "d1.F0001"));

        std::fs::write(&text_path, b"one\n\xff\xfe\n").unwrap();
        assert!(load(&text_path, &id_path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("a"), &dir.path().join("b")).is_err());
    }
}
