//! Identifier index: checkpoint recovery and resume offsets.

mod checkpoint;
mod resume;

pub use checkpoint::{document_prefix, load_processed_prefixes, Checkpoint};
pub use resume::{compute_start_offset, count_reprocessed, ResumePlan, ResumeSource};
