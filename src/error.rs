//! Error taxonomy shared by the ledger, the scheduler, the rule functions and the forms.
use crate::store::{FormId, LineKey};
use std::fmt;
use thiserror::Error;

/// The specific way a form module broke its declared contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    /// Read a line that is not among its required inputs.
    UndeclaredRead,
    /// Wrote a line it does not declare as produced.
    UndeclaredWrite,
    /// Tried to supply a rule-governed line without calling the rule function.
    RuleGoverned,
    /// Finished without producing a declared line.
    MissingOutput,
    /// Produced the same line twice.
    DuplicateOutput,
    /// Asked to compute a line that declares no formula.
    NoFormula,
    /// Handed back a line whose recorded formula is not the declared one.
    FormulaMismatch,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Violation::UndeclaredRead => "read of an undeclared input",
            Violation::UndeclaredWrite => "write of an undeclared output",
            Violation::RuleGoverned => "rule-governed line supplied without its rule function",
            Violation::MissingOutput => "declared output never produced",
            Violation::DuplicateOutput => "output produced twice",
            Violation::NoFormula => "computed line declares no formula",
            Violation::FormulaMismatch => "recorded formula differs from the declaration",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaxError {
    #[error("Line '{key}' was never written")]
    MissingLine { key: LineKey },
    #[error("Line '{key}' already written this run (second writer: '{producer}')")]
    DuplicateWrite { key: LineKey, producer: FormId },
    #[error("Dependency cycle between forms {forms:?}")]
    Cycle { forms: Vec<FormId> },
    #[error("Form '{form}' requires '{key}', which no form produces and no input seeds")]
    UnresolvedDependency { form: FormId, key: LineKey },
    #[error("Form '{form}' declares unknown upstream form '{upstream}'")]
    UnknownUpstream { form: FormId, upstream: FormId },
    #[error("Form '{form}' declared twice")]
    DuplicateForm { form: FormId },
    #[error("Line '{key}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer { key: LineKey, first: FormId, second: FormId },
    #[error("Contract violation in form '{form}' at '{key}': {violation}")]
    ContractViolation { form: FormId, key: LineKey, violation: Violation },
    #[error("Formula for '{key}' takes {expected} inputs, {actual} declared")]
    Arity { key: LineKey, expected: usize, actual: usize },
    #[error("Line '{key}' holds a {actual} value, expected {expected}")]
    TypeMismatch { key: LineKey, expected: &'static str, actual: &'static str },
    #[error("Negative amount {amount} passed to {rule}")]
    NegativeAmount { rule: &'static str, amount: String },
    #[error("Reasoning for '{key}' in form '{form}' failed: {message}")]
    Reasoning { form: FormId, key: LineKey, message: String },
    #[error("Amount overflow in {context}")]
    Overflow { context: String },
    #[error("Engine expects {expected} form modules in schedule order, got {found}")]
    ModuleCount { expected: usize, found: usize },
    #[error("Module '{found}' sits in schedule slot {slot}, which belongs to '{expected}'")]
    ModuleMismatch { slot: usize, expected: FormId, found: FormId },
    #[error("Run aborted in form '{form}': {source}")]
    Aborted { form: FormId, source: Box<TaxError>, cancelled: Vec<FormId> },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
