//! File I/O for document input and annotated output.

pub mod record_source;
mod result_writer;

pub use record_source::Record;
pub use result_writer::ResultWriter;
