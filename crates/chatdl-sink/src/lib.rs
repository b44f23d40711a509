//! Output sink (spec.md §4.8): JSON/CSV whole-buffer dumps,
//! streamed plain text, and the stdout mirror.

pub mod format;
pub mod sink;

pub use format::OutputFormat;
pub use sink::OutputSink;
