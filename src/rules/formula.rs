//! Formula tags: the replayable description of how a line was computed.
//!
//! A [`Formula`] is stored in the provenance of every rule-computed line and of
//! every composite (sum/difference) line. Form modules and the verifier both
//! evaluate lines through [`Formula::evaluate`], so there is exactly one
//! implementation of each rule in the crate.
use super::{adjustments, brackets, credits, deduction, self_employment};
use crate::compute::LineSource;
use crate::config::TaxYearConfig;
use crate::error::TaxError;
use crate::store::{FilingStatus, LineKey, Money, Value};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// The closed set of tax rule functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// `[taxable_income, filing_status]`
    BracketTax,
    /// `[filing_status, taxpayer_65, taxpayer_blind, spouse_65, spouse_blind]`
    StandardDeduction,
    /// `[net_profit]`
    SelfEmploymentNetEarnings,
    /// `[net_profit]`
    SelfEmploymentTax,
    /// `[net_profit]`
    SelfEmploymentDeduction,
    /// `[paid, eligible, spouse_paid, spouse_eligible, filing_status]`
    EducatorExpense,
    /// `[paid, modified_agi, filing_status]`
    StudentLoanInterest,
    /// `[net_profit, filing_status]`
    ExcessBusinessLoss,
    /// `[qualifying_children, tax]`
    ChildTaxCredit,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::BracketTax => "bracket_tax",
            Rule::StandardDeduction => "standard_deduction",
            Rule::SelfEmploymentNetEarnings => "self_employment_net_earnings",
            Rule::SelfEmploymentTax => "self_employment_tax",
            Rule::SelfEmploymentDeduction => "self_employment_deduction",
            Rule::EducatorExpense => "educator_expense",
            Rule::StudentLoanInterest => "student_loan_interest",
            Rule::ExcessBusinessLoss => "excess_business_loss",
            Rule::ChildTaxCredit => "child_tax_credit",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Rule::SelfEmploymentNetEarnings | Rule::SelfEmploymentTax | Rule::SelfEmploymentDeduction => 1,
            Rule::BracketTax | Rule::ExcessBusinessLoss | Rule::ChildTaxCredit => 2,
            Rule::StudentLoanInterest => 3,
            Rule::EducatorExpense | Rule::StandardDeduction => 5,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// A rule applied to ledger lines, in the rule's positional input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCall {
    pub rule: Rule,
    pub inputs: SmallVec<[LineKey; 4]>,
}

impl RuleCall {
    pub fn new(rule: Rule, inputs: impl IntoIterator<Item = LineKey>) -> Self {
        Self { rule, inputs: inputs.into_iter().collect() }
    }

    fn evaluate(&self, source: &dyn LineSource, config: &TaxYearConfig) -> Result<Value, TaxError> {
        let args = Args { rule: self.rule, keys: &self.inputs, source };
        let money = match self.rule {
            Rule::BracketTax => {
                let table = config.brackets_for(args.status(1)?)?;
                brackets::bracket_tax(args.money(0)?, table)?
            }
            Rule::StandardDeduction => {
                let factors = deduction::DeductionFactors {
                    taxpayer_65_or_older: args.flag(1)?,
                    taxpayer_blind: args.flag(2)?,
                    spouse_65_or_older: args.flag(3)?,
                    spouse_blind: args.flag(4)?,
                };
                deduction::standard_deduction(args.status(0)?, factors, &config.standard_deduction)?
            }
            Rule::SelfEmploymentNetEarnings => {
                self_employment::self_employment_tax(args.money(0)?, &config.self_employment).net_earnings
            }
            Rule::SelfEmploymentTax => self_employment::self_employment_tax(args.money(0)?, &config.self_employment).total,
            Rule::SelfEmploymentDeduction => {
                self_employment::self_employment_tax(args.money(0)?, &config.self_employment).deductible_half
            }
            Rule::EducatorExpense => {
                let taxpayer = adjustments::Educator { paid: args.money(0)?, eligible: args.flag(1)? };
                let spouse = adjustments::Educator { paid: args.money(2)?, eligible: args.flag(3)? };
                adjustments::educator_expense(taxpayer, spouse, args.status(4)?, &config.adjustments)?
            }
            Rule::StudentLoanInterest => {
                adjustments::student_loan_interest(args.money(0)?, args.money(1)?, args.status(2)?, &config.adjustments)?
            }
            Rule::ExcessBusinessLoss => {
                adjustments::excess_business_loss(args.money(0)?, args.status(1)?, &config.adjustments)
            }
            Rule::ChildTaxCredit => credits::child_tax_credit(args.count(0)?, args.money(1)?, &config.child_tax_credit),
        };
        Ok(Value::Money(money))
    }
}

/// Positional access to a rule's inputs with kind checking.
struct Args<'a> {
    rule: Rule,
    keys: &'a [LineKey],
    source: &'a dyn LineSource,
}

impl Args<'_> {
    fn value(&self, i: usize) -> Result<(&LineKey, Value), TaxError> {
        let key = self.keys.get(i).ok_or_else(|| {
            TaxError::InvalidInput(format!(
                "{} takes {} inputs, {} given",
                self.rule,
                self.rule.arity(),
                self.keys.len()
            ))
        })?;
        Ok((key, *self.source.value(key)?))
    }

    fn money(&self, i: usize) -> Result<Money, TaxError> {
        let (key, v) = self.value(i)?;
        v.as_money(key)
    }

    fn status(&self, i: usize) -> Result<FilingStatus, TaxError> {
        let (key, v) = self.value(i)?;
        v.as_status(key)
    }

    fn flag(&self, i: usize) -> Result<bool, TaxError> {
        let (key, v) = self.value(i)?;
        v.as_flag(key)
    }

    fn count(&self, i: usize) -> Result<u32, TaxError> {
        let (key, v) = self.value(i)?;
        v.as_count(key)
    }
}

/// `sum(addends) - sum(subtrahends)`, optionally floored at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composite {
    pub addends: SmallVec<[LineKey; 4]>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub subtrahends: SmallVec<[LineKey; 4]>,
    #[serde(default)]
    pub floor_at_zero: bool,
}

impl Composite {
    pub fn sum(addends: impl IntoIterator<Item = LineKey>) -> Self {
        Self { addends: addends.into_iter().collect(), subtrahends: SmallVec::new(), floor_at_zero: false }
    }

    pub fn minus(mut self, subtrahends: impl IntoIterator<Item = LineKey>) -> Self {
        self.subtrahends.extend(subtrahends);
        self
    }

    pub fn floored(mut self) -> Self {
        self.floor_at_zero = true;
        self
    }

    pub fn evaluate(&self, source: &dyn LineSource) -> Result<Value, TaxError> {
        let overflow = |key: &LineKey| TaxError::Overflow { context: format!("composite over '{}'", key) };
        let mut total = Money::ZERO;
        for key in &self.addends {
            let amount = source.value(key)?.as_money(key)?;
            total = total.checked_add(amount).ok_or_else(|| overflow(key))?;
        }
        for key in &self.subtrahends {
            let amount = source.value(key)?.as_money(key)?;
            total = total.checked_sub(amount).ok_or_else(|| overflow(key))?;
        }
        if self.floor_at_zero {
            total = total.clamp_non_negative();
        }
        Ok(Value::Money(total))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Formula {
    Rule(RuleCall),
    Composite(Composite),
}

impl Formula {
    pub fn rule(rule: Rule, inputs: impl IntoIterator<Item = LineKey>) -> Self {
        Formula::Rule(RuleCall::new(rule, inputs))
    }

    /// Short tag naming the rule function, or `composite`.
    pub fn tag(&self) -> &'static str {
        match self {
            Formula::Rule(call) => call.rule.name(),
            Formula::Composite(_) => "composite",
        }
    }

    pub fn is_rule(&self) -> bool { matches!(self, Formula::Rule(_)) }

    /// Every line the formula reads.
    pub fn inputs(&self) -> impl Iterator<Item = &LineKey> + '_ {
        let (first, second) = match self {
            Formula::Rule(call) => (call.inputs.as_slice(), &[] as &[LineKey]),
            Formula::Composite(c) => (c.addends.as_slice(), c.subtrahends.as_slice()),
        };
        first.iter().chain(second.iter())
    }

    /// Checks the declared input count for the line `key` the formula governs.
    pub fn check_arity(&self, key: &LineKey) -> Result<(), TaxError> {
        match self {
            Formula::Rule(call) if call.inputs.len() != call.rule.arity() => {
                Err(TaxError::Arity { key: key.clone(), expected: call.rule.arity(), actual: call.inputs.len() })
            }
            // An empty sum is zero: a schedule with no items still balances.
            _ => Ok(()),
        }
    }

    pub fn evaluate(&self, source: &dyn LineSource, config: &TaxYearConfig) -> Result<Value, TaxError> {
        match self {
            Formula::Rule(call) => call.evaluate(source, config),
            Formula::Composite(c) => c.evaluate(source),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Rule(call) => {
                write!(f, "{}(", call.rule)?;
                for (i, key) in call.inputs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", key)?;
                }
                f.write_str(")")
            }
            Formula::Composite(c) => {
                if c.floor_at_zero {
                    f.write_str("max(0, ")?;
                }
                for (i, key) in c.addends.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    write!(f, "{}", key)?;
                }
                for key in &c.subtrahends {
                    write!(f, " - {}", key)?;
                }
                if c.floor_at_zero {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Ledger;

    const WAGES: LineKey = LineKey::from_static("w2.0", "box1");
    const INTEREST: LineKey = LineKey::from_static("1099_int.0", "box1");
    const DEDUCTION: LineKey = LineKey::from_static("f1040", "12");
    const STATUS: LineKey = LineKey::from_static("taxpayer", "filing_status");

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.seed(WAGES, Money::from_dollars(50_000)).unwrap();
        ledger.seed(INTEREST, Money::from_dollars(250)).unwrap();
        ledger.seed(DEDUCTION, Money::from_dollars(60_000)).unwrap();
        ledger.seed(STATUS, Value::Status(FilingStatus::Single)).unwrap();
        ledger
    }

    #[test]
    fn test_composite_sum_and_floor() {
        let ledger = ledger();
        let config = TaxYearConfig::ty2024();
        let total = Formula::Composite(Composite::sum([WAGES, INTEREST]));
        assert_eq!(total.evaluate(&ledger, &config).unwrap(), Value::Money(Money::from_dollars(50_250)));

        let taxable = Formula::Composite(Composite::sum([WAGES]).minus([DEDUCTION]).floored());
        assert_eq!(taxable.evaluate(&ledger, &config).unwrap(), Value::Money(Money::ZERO));
        assert_eq!(taxable.to_string(), "max(0, w2.0:box1 - f1040:12)");
    }

    #[test]
    fn test_composite_overflow_is_an_error() {
        let mut ledger = Ledger::new();
        let big = Money::from_cents(i64::MAX / 2 + 1);
        ledger.seed(WAGES, big).unwrap();
        ledger.seed(INTEREST, big).unwrap();
        let total = Formula::Composite(Composite::sum([WAGES, INTEREST]));
        let err = total.evaluate(&ledger, &TaxYearConfig::ty2024()).unwrap_err();
        assert!(matches!(err, TaxError::Overflow { .. }), "{err}");
    }

    #[test]
    fn test_rule_dispatch() {
        let ledger = ledger();
        let config = TaxYearConfig::ty2024();
        let tax = Formula::rule(Rule::BracketTax, [INTEREST, STATUS]);
        assert_eq!(tax.evaluate(&ledger, &config).unwrap(), Value::Money(Money::from_dollars(25)));
        assert_eq!(tax.tag(), "bracket_tax");
    }

    #[test]
    fn test_kind_mismatch_and_missing_input() {
        let ledger = ledger();
        let config = TaxYearConfig::ty2024();
        let swapped = Formula::rule(Rule::BracketTax, [STATUS, WAGES]);
        assert!(matches!(swapped.evaluate(&ledger, &config), Err(TaxError::TypeMismatch { .. })));

        let missing = Formula::Composite(Composite::sum([LineKey::from_static("w2.1", "box1")]));
        assert!(matches!(missing.evaluate(&ledger, &config), Err(TaxError::MissingLine { .. })));
    }

    #[test]
    fn test_arity_check() {
        let short = Formula::rule(Rule::StandardDeduction, [STATUS]);
        let err = short.check_arity(&DEDUCTION).unwrap_err();
        assert_eq!(err, TaxError::Arity { key: DEDUCTION, expected: 5, actual: 1 });
        let empty = Formula::Composite(Composite::sum(Vec::new()));
        assert!(empty.check_arity(&DEDUCTION).is_ok());
        assert_eq!(empty.evaluate(&ledger(), &TaxYearConfig::ty2024()).unwrap(), Value::Money(Money::ZERO));
    }

    #[test]
    fn test_serde_shape() {
        let formula = Formula::rule(Rule::BracketTax, [INTEREST, STATUS]);
        let json = serde_json::to_value(&formula).unwrap();
        assert_eq!(json["type"], "rule");
        assert_eq!(json["rule"], "bracket_tax");
        assert_eq!(json["inputs"][1], "taxpayer:filing_status");
        let back: Formula = serde_json::from_value(json).unwrap();
        assert_eq!(back, formula);
    }
}
