//! Annotation backends.
//!
//! The pipeline treats annotation as an opaque service: one document in, its
//! processed sentences and their identifiers out. Backends implement
//! [`Annotator`] and are handed to the scheduler as `Arc<dyn Annotator>`.

mod command;
mod passthrough;

pub use command::CommandAnnotator;
pub use passthrough::PassthroughAnnotator;

use crate::config::AnnotatorConfig;
use crate::error::AnnotationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Processed form of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationOutput {
    /// Processed text, one line per sentence
    pub text: String,

    /// Sentence identifiers, one per line of `text`
    #[serde(rename = "ids")]
    pub sub_ids: Vec<String>,
}

impl AnnotationOutput {
    pub fn new(text: impl Into<String>, sub_ids: Vec<String>) -> Self {
        Self {
            text: text.into(),
            sub_ids,
        }
    }

    /// Build from parallel sentence and identifier lists.
    pub fn from_sentences<S: AsRef<str>>(sentences: &[S], sub_ids: Vec<String>) -> Self {
        let text = sentences
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, sub_ids }
    }

    /// No text or no identifiers; such outputs are not written.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() || self.sub_ids.is_empty()
    }

    /// Text lines as they will be written, without the trailing newline.
    pub fn text_lines(&self) -> &str {
        self.text.trim_end_matches(&['\r', '\n'][..])
    }

    /// Check that the output maps onto whole, paired lines: one identifier
    /// per text line, each identifier a single non-empty line.
    pub fn check_aligned(&self) -> Result<(), AnnotationError> {
        let text_lines = self.text_lines().lines().count();
        if text_lines != self.sub_ids.len() {
            return Err(AnnotationError::Malformed(format!(
                "{} text lines but {} sentence ids",
                text_lines,
                self.sub_ids.len()
            )));
        }
        if let Some(bad) = self
            .sub_ids
            .iter()
            .find(|id| id.trim().is_empty() || id.contains(&['\r', '\n'][..]))
        {
            return Err(AnnotationError::Malformed(format!(
                "invalid sentence id {:?}",
                bad
            )));
        }
        Ok(())
    }
}

/// A service that annotates single documents.
///
/// Implementations must be safe to call from many workers at once; any
/// capacity limits of the underlying service are its own concern.
#[async_trait]
pub trait Annotator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Annotate one document.
    async fn annotate(&self, text: &str, id: &str) -> Result<AnnotationOutput, AnnotationError>;
}

/// Construct the backend selected in the configuration.
pub fn from_config(config: &AnnotatorConfig) -> Arc<dyn Annotator> {
    match config {
        AnnotatorConfig::Passthrough => Arc::new(PassthroughAnnotator),
        AnnotatorConfig::Command { program, args } => {
            Arc::new(CommandAnnotator::new(program.clone(), args.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sentences() {
        let output = AnnotationOutput::from_sentences(
            &["first .", "second ."],
            vec!["d1.F0001_0".to_string(), "d1.F0001_1".to_string()],
        );
        assert_eq!(output.text, "first .\nsecond .");
        assert!(!output.is_empty());
    }

    #[test]
    fn test_is_empty() {
        assert!(AnnotationOutput::default().is_empty());
        assert!(AnnotationOutput::new("  ", vec!["x".to_string()]).is_empty());
        assert!(AnnotationOutput::new("text", vec![]).is_empty());
    }

    #[test]
    fn test_check_aligned() {
        let ids = |n: usize| (0..n).map(|i| format!("d1.F0001_{}", i)).collect::<Vec<_>>();

        assert!(AnnotationOutput::new("s1\ns2\n", ids(2)).check_aligned().is_ok());
        assert!(matches!(
            AnnotationOutput::new("s1\ns2\ns3", ids(1)).check_aligned(),
            Err(AnnotationError::Malformed(_))
        ));
        assert!(AnnotationOutput::new("s1", ids(2)).check_aligned().is_err());
    }

    #[test]
    fn test_check_aligned_rejects_bad_ids() {
        let empty_id = AnnotationOutput::new("s1\ns2", vec!["a".to_string(), "".to_string()]);
        assert!(empty_id.check_aligned().is_err());

        let split_id = AnnotationOutput::new("s1", vec!["a\nb".to_string()]);
        assert!(split_id.check_aligned().is_err());
    }

    #[test]
    fn test_output_json_shape() {
        let output: AnnotationOutput =
            serde_json::from_str(r#"{"text": "a b", "ids": ["d1.F0001_0"]}"#).unwrap();
        assert_eq!(output.sub_ids, vec!["d1.F0001_0"]);
    }

    #[test]
    fn test_from_config() {
        let annotator = from_config(&AnnotatorConfig::Passthrough);
        assert_eq!(annotator.name(), "passthrough");

        let annotator = from_config(&AnnotatorConfig::Command {
            program: "parse".to_string(),
            args: vec![],
        });
        assert_eq!(annotator.name(), "parse");
    }
}
