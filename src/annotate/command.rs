//! External-process annotation backend.

use super::{AnnotationOutput, Annotator};
use crate::error::AnnotationError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs `program args.. --id <record id>` once per document.
///
/// The document text is written to the child's stdin. The child must print a
/// JSON object `{"text": "...", "ids": [...]}` on stdout and exit with status
/// zero; anything else is an annotation failure for that document.
#[derive(Debug, Clone)]
pub struct CommandAnnotator {
    program: String,
    args: Vec<String>,
}

impl CommandAnnotator {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl Annotator for CommandAnnotator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn annotate(&self, text: &str, id: &str) -> Result<AnnotationOutput, AnnotationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--id")
            .arg(id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AnnotationError::Service(format!("failed to spawn {}: {}", self.program, e)))?;

        // Feed stdin while draining stdout and stderr, so a child that writes
        // as it reads never blocks on a full pipe
        let stdin = child.stdin.take();
        let feed = async move {
            match stdin {
                // Dropping stdin at the end closes the pipe so the child sees EOF
                Some(mut stdin) => stdin.write_all(text.as_bytes()).await,
                None => Ok(()),
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|e| AnnotationError::Service(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnnotationError::Service(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        match fed {
            // The child may exit successfully without reading all of its input
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(AnnotationError::Service(format!("failed to write stdin: {}", e)));
            }
            _ => {}
        }

        serde_json::from_slice(&output.stdout).map_err(|e| AnnotationError::Malformed(e.to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandAnnotator {
        CommandAnnotator::new(
            "sh".to_string(),
            vec!["-c".to_string(), script.to_string(), "annotate".to_string()],
        )
    }

    #[tokio::test]
    async fn test_command_success() {
        // $2 is the record id passed after --id
        let annotator = sh(r#"cat >/dev/null; printf '{"text":"parsed","ids":["%s_0"]}' "$2""#);
        let output = annotator.annotate("raw text", "d1.F0001").await.unwrap();
        assert_eq!(output.text, "parsed");
        assert_eq!(output.sub_ids, vec!["d1.F0001_0"]);
    }

    #[tokio::test]
    async fn test_command_reads_stdin() {
        let annotator = sh(r#"t=$(cat); printf '{"text":"%s","ids":["x"]}' "$t""#);
        let output = annotator.annotate("hello", "d1.F0001").await.unwrap();
        assert_eq!(output.text, "hello");
    }

    #[tokio::test]
    async fn test_command_streams_large_document() {
        // cat echoes input while it is still being written
        let annotator = sh(r#"printf '{"text":"'; cat; printf '","ids":["%s_0"]}' "$2""#);
        let document = "a".repeat(2 * 1024 * 1024);

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            annotator.annotate(&document, "d1.F0001"),
        )
        .await
        .expect("annotation stalled")
        .unwrap();
        assert_eq!(output.text.len(), document.len());
        assert_eq!(output.sub_ids, vec!["d1.F0001_0"]);
    }

    #[tokio::test]
    async fn test_command_may_ignore_input() {
        let annotator = sh(r#"printf '{"text":"fixed","ids":["x"]}'"#);
        let document = "a".repeat(1024 * 1024);
        let output = annotator.annotate(&document, "d1.F0001").await.unwrap();
        assert_eq!(output.text, "fixed");
    }

    #[tokio::test]
    async fn test_command_nonzero_exit() {
        let annotator = sh("cat >/dev/null; echo boom >&2; exit 3");
        let err = annotator.annotate("x", "d1.F0001").await.unwrap_err();
        assert!(matches!(err, AnnotationError::Service(msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn test_command_malformed_output() {
        let annotator = sh("cat >/dev/null; echo not-json");
        let err = annotator.annotate("x", "d1.F0001").await.unwrap_err();
        assert!(matches!(err, AnnotationError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_command_missing_program() {
        let annotator = CommandAnnotator::new("/nonexistent/annotator".to_string(), vec![]);
        assert!(annotator.annotate("x", "d1.F0001").await.is_err());
    }
}
