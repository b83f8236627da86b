//! Post-run verification of a ledger snapshot.
pub mod checks;
pub mod finding;
pub mod verifier;

pub use checks::Check;
pub use finding::{Severity, VerificationFinding, VerificationReport};
pub use verifier::Verifier;
