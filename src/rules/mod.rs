//! Pure tax rule functions and the formula tags that dispatch to them.
//!
//! Nothing in here touches the ledger directly: every function takes plain
//! amounts and year parameters, so identical inputs give identical outputs.
pub mod adjustments;
pub mod brackets;
pub mod credits;
pub mod deduction;
pub mod formula;
pub mod self_employment;

pub use adjustments::{educator_expense, excess_business_loss, student_loan_interest, AdjustmentParams, Educator, PhaseOut};
pub use brackets::{bracket_tax, marginal_rate, Bracket, BracketTable};
pub use credits::{child_tax_credit, ChildTaxCreditParams};
pub use deduction::{standard_deduction, DeductionFactors, DeductionTable};
pub use formula::{Composite, Formula, Rule, RuleCall};
pub use self_employment::{self_employment_tax, SelfEmploymentParams, SelfEmploymentTax};
