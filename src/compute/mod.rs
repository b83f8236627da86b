//! Per-run execution: the write-once ledger, the staged engine and the
//! end-to-end pipeline.
pub mod engine;
pub mod ledger;
pub mod pipeline;

pub use engine::{Engine, RunSummary};
pub use ledger::{Ledger, LedgerEntry, LedgerSnapshot, LineSource};
pub use pipeline::{ReturnRun, TaxPipeline, TerminalOutput, TERMINAL_FORM};
