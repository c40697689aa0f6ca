use super::{AnnotationOutput, Annotator};
use crate::error::AnnotationError;
use async_trait::async_trait;

/// Emits each document unchanged as a single sentence `<id>_0`.
///
/// Useful for dry runs of the pipeline plumbing.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughAnnotator;

#[async_trait]
impl Annotator for PassthroughAnnotator {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn annotate(&self, text: &str, id: &str) -> Result<AnnotationOutput, AnnotationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(AnnotationOutput::default());
        }
        Ok(AnnotationOutput::new(text, vec![format!("{}_0", id)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough() {
        let output = PassthroughAnnotator
            .annotate(" some text ", "d1.F0001")
            .await
            .unwrap();
        assert_eq!(output.text, "some text");
        assert_eq!(output.sub_ids, vec!["d1.F0001_0"]);
    }

    #[tokio::test]
    async fn test_passthrough_empty() {
        let output = PassthroughAnnotator.annotate("", "d1.F0001").await.unwrap();
        assert!(output.is_empty());
    }
}
