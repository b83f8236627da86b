//! Deterministic tax-return engine.
//!
//! Forms are nodes of a dependency graph over ledger lines. A compiled
//! [`graph::Schedule`] is executed stage by stage against a write-once
//! [`compute::Ledger`]; every rule-governed and composite line carries the
//! formula that produced it, and [`validation::Verifier`] replays those
//! formulas independently before a return is reported as verified.
//!
//! ```no_run
//! use taxflow_core::{FilingStatus, TaxPipeline, TaxReturnInput, TaxYearConfig};
//!
//! # fn main() -> Result<(), taxflow_core::TaxError> {
//! let input = TaxReturnInput::new(FilingStatus::Single);
//! let pipeline = TaxPipeline::new(TaxYearConfig::ty2024(), input.shape())?;
//! let run = pipeline.run(&input)?;
//! println!("{}", run.report);
//! # Ok(())
//! # }
//! ```
pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod error;
pub mod forms;
pub mod graph;
pub mod input;
pub mod rules;
pub mod store;
pub mod validation;

pub use compute::{Ledger, LedgerSnapshot, ReturnRun, TaxPipeline, TerminalOutput};
pub use config::TaxYearConfig;
pub use error::{TaxError, Violation};
pub use input::{InputShape, TaxReturnInput};
pub use store::{FilingStatus, FormId, LineKey, LineValue, Money, Value};
pub use validation::{Severity, VerificationFinding, VerificationReport, Verifier};
