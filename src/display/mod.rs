//! Human-readable renderings of a finished run.
pub mod trace;

pub use trace::format_trace;
