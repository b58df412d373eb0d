//! Input/output adapters: read sources and failed-read sinks.

pub mod async_writer;
pub mod failed_sink;
pub mod read_source;

pub use failed_sink::{FailedReadSink, FastqFailedSink};
pub use read_source::{CountLimitedSource, FileReadSource, ReadSource};
