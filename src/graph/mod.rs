//! Static structure of a form set: node declarations and the compiled schedule.
pub mod dag;
pub mod node;

pub use dag::{DependencyGraph, Schedule};
pub use node::{FormNode, LineSpec};
