//! Structured view over APKEditor `info` text output.

pub mod debounce;
pub mod parser;
pub mod report;

pub use debounce::{ReportWatcher, DEFAULT_QUIET};
pub use parser::parse;
pub use report::{Blocks, Fields, ParsedReport, NAMED_LISTS};
