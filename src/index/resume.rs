//! Resume offset computation.

use crate::index::checkpoint::{document_prefix, Checkpoint};
use std::collections::HashSet;

/// Where the start offset of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    /// Supplied by the operator
    Explicit,
    /// Derived from the checkpoint index
    Checkpoint,
}

/// Start point of a run over `total` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePlan {
    pub start_offset: usize,
    pub total: usize,
    pub source: ResumeSource,
}

impl ResumePlan {
    /// Resolve the start offset for `record_ids` against `checkpoint`.
    pub fn resolve<S: AsRef<str>>(
        record_ids: &[S],
        checkpoint: &Checkpoint,
        explicit_start: Option<usize>,
        marker: &str,
    ) -> Self {
        let source = match explicit_start {
            Some(_) => ResumeSource::Explicit,
            None => ResumeSource::Checkpoint,
        };
        Self {
            start_offset: compute_start_offset(
                record_ids,
                checkpoint.prefixes(),
                explicit_start,
                marker,
            ),
            total: record_ids.len(),
            source,
        }
    }

    /// Records left to process.
    pub fn remaining(&self) -> usize {
        self.total - self.start_offset
    }

    pub fn is_complete(&self) -> bool {
        self.start_offset >= self.total
    }
}

impl std::fmt::Display for ResumePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Starting from index {}. Processing {} documents out of {}",
            self.start_offset,
            self.remaining(),
            self.total
        )
    }
}

/// Index into `record_ids` at which processing should start.
///
/// An explicit start is used as given (clamped to the record count).
/// Otherwise the result is the length of the longest prefix of `record_ids`
/// whose document prefixes all appear in `processed`. The scan stops at the
/// first unprocessed document even if later ones were completed, so a single
/// failed record causes everything after it to be processed again.
pub fn compute_start_offset<S: AsRef<str>>(
    record_ids: &[S],
    processed: &HashSet<String>,
    explicit_start: Option<usize>,
    marker: &str,
) -> usize {
    if let Some(start) = explicit_start {
        if start > record_ids.len() {
            tracing::warn!(
                "Explicit start offset {} exceeds record count {}",
                start,
                record_ids.len()
            );
        }
        return start.min(record_ids.len());
    }

    record_ids
        .iter()
        .take_while(|id| processed.contains(document_prefix(id.as_ref(), marker)))
        .count()
}

/// Records from `start_offset` on that are already in `processed` and will
/// be annotated again.
pub fn count_reprocessed<S: AsRef<str>>(
    record_ids: &[S],
    processed: &HashSet<String>,
    start_offset: usize,
    marker: &str,
) -> usize {
    record_ids
        .iter()
        .skip(start_offset)
        .filter(|id| processed.contains(document_prefix(id.as_ref(), marker)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("d{}.F0001", i)).collect()
    }

    fn processed(prefixes: &[&str]) -> HashSet<String> {
        prefixes.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_empty_checkpoint_starts_at_zero() {
        assert_eq!(compute_start_offset(&ids(5), &HashSet::new(), None, ".F"), 0);
    }

    #[test]
    fn test_contiguous_prefix() {
        let done = processed(&["d1.F", "d2.F", "d3.F"]);
        assert_eq!(compute_start_offset(&ids(5), &done, None, ".F"), 3);
    }

    #[test]
    fn test_fully_processed() {
        let done = processed(&["d1.F", "d2.F", "d3.F", "d4.F", "d5.F"]);
        assert_eq!(compute_start_offset(&ids(5), &done, None, ".F"), 5);
    }

    #[test]
    fn test_gap_stops_scan() {
        // d3 failed; d4 and d5 completed but are processed again
        let done = processed(&["d1.F", "d2.F", "d4.F", "d5.F"]);
        assert_eq!(compute_start_offset(&ids(5), &done, None, ".F"), 2);
    }

    #[test]
    fn test_first_record_missing() {
        let done = processed(&["d2.F", "d3.F"]);
        assert_eq!(compute_start_offset(&ids(3), &done, None, ".F"), 0);
    }

    #[test]
    fn test_explicit_start_is_verbatim() {
        let done = processed(&["d1.F", "d2.F", "d3.F"]);
        assert_eq!(compute_start_offset(&ids(5), &done, Some(1), ".F"), 1);
        assert_eq!(compute_start_offset(&ids(5), &done, Some(0), ".F"), 0);
        assert_eq!(compute_start_offset(&ids(5), &HashSet::new(), Some(4), ".F"), 4);
    }

    #[test]
    fn test_explicit_start_clamped() {
        assert_eq!(compute_start_offset(&ids(5), &HashSet::new(), Some(99), ".F"), 5);
    }

    #[test]
    fn test_unmarked_ids_compare_whole() {
        let record_ids = vec!["a", "b", "c"];
        let done = processed(&["a", "b"]);
        assert_eq!(compute_start_offset(&record_ids, &done, None, ".F"), 2);
    }

    #[test]
    fn test_count_reprocessed_after_gap() {
        // d0 is not an input record; d1 is before the gap
        let done = processed(&["d0.F", "d1.F", "d4.F", "d5.F"]);
        let start = compute_start_offset(&ids(5), &done, None, ".F");
        assert_eq!(start, 1);
        assert_eq!(count_reprocessed(&ids(5), &done, start, ".F"), 2);
        assert_eq!(count_reprocessed(&ids(5), &done, 5, ".F"), 0);
    }

    #[test]
    fn test_resume_plan_display() {
        let checkpoint = Checkpoint::from_lines(["d1.F0001_0", "d2.F0001_0"], ".F");
        let plan = ResumePlan::resolve(&ids(5), &checkpoint, None, ".F");

        assert_eq!(plan.start_offset, 2);
        assert_eq!(plan.remaining(), 3);
        assert_eq!(plan.source, ResumeSource::Checkpoint);
        assert!(!plan.is_complete());
        assert_eq!(
            plan.to_string(),
            "Starting from index 2. Processing 3 documents out of 5"
        );
    }

    #[test]
    fn test_resume_plan_explicit_source() {
        let plan = ResumePlan::resolve(&ids(5), &Checkpoint::fresh(), Some(5), ".F");
        assert_eq!(plan.source, ResumeSource::Explicit);
        assert!(plan.is_complete());
    }
}
