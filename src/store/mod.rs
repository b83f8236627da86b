//! Identifiers and values stored in the line ledger.
pub mod types;

pub use types::{Derivation, FilingStatus, FormId, LineKey, LineValue, Money, Provenance, Value};
pub(crate) use types::div_round_half_up;
