//! Cross-line consistency checks.
//!
//! Each check inspects a handful of lines in a finished snapshot. A check
//! whose lines are not all present is skipped.
use super::finding::{Severity, VerificationFinding};
use crate::compute::LedgerSnapshot;
use crate::store::{LineKey, Money, Value};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// At most one of the two lines may be non-zero (refund vs amount owed).
    MutuallyExclusive { first: LineKey, second: LineKey },
    NonNegative { key: LineKey },
    /// Values above `limit` are unusual enough to flag for review.
    Ceiling { key: LineKey, limit: Money },
    /// Positive taxable income with zero tax.
    TaxOnIncome { income: LineKey, tax: LineKey },
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::MutuallyExclusive { .. } => "mutually_exclusive",
            Check::NonNegative { .. } => "non_negative",
            Check::Ceiling { .. } => "ceiling",
            Check::TaxOnIncome { .. } => "tax_on_income",
        }
    }

    pub fn evaluate(&self, snapshot: &LedgerSnapshot) -> Option<VerificationFinding> {
        let money = |key: &LineKey| snapshot.get(key).ok().and_then(|v| match v.value() {
            Value::Money(m) => Some(*m),
            _ => None,
        });

        match self {
            Check::MutuallyExclusive { first, second } => {
                let (a, b) = (money(first)?, money(second)?);
                (!a.is_zero() && !b.is_zero()).then(|| {
                    self.finding(
                        first,
                        Severity::Error,
                        a,
                        format!("both {} ({}) and {} ({}) are non-zero", first, a, second, b),
                    )
                })
            }
            Check::NonNegative { key } => {
                let v = money(key)?;
                v.is_negative().then(|| self.finding(key, Severity::Error, v, format!("{} is negative", key)))
            }
            Check::Ceiling { key, limit } => {
                let v = money(key)?;
                (v > *limit).then(|| self.finding(key, Severity::Warning, v, format!("{} exceeds {}", key, limit)))
            }
            Check::TaxOnIncome { income, tax } => {
                let (i, t) = (money(income)?, money(tax)?);
                (i > Money::ZERO && t.is_zero()).then(|| {
                    self.finding(tax, Severity::Warning, t, format!("zero tax on taxable income of {}", i))
                })
            }
        }
    }

    fn finding(&self, key: &LineKey, severity: Severity, actual: Money, message: String) -> VerificationFinding {
        VerificationFinding {
            key: key.clone(),
            expected: None,
            actual: Some(Value::Money(actual)),
            severity,
            rule: self.name().to_string(),
            message,
        }
    }
}
