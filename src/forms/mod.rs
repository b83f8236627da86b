//! Form modules: the contract every form implements, the reasoning delegate
//! interface, and the standard form set.
pub mod contract;
pub mod lines;
pub mod reasoner;
pub mod standard;

pub use contract::{FormModule, FormOutput, LedgerView, LineSet};
pub use reasoner::{DerivationRequest, DeterministicReasoner, LineReasoner};
pub use standard::{raw_input_keys, standard_checks, standard_forms, Form, FormKind};
