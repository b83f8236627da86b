//! Progressive bracket tax (Form 1040 line 16).
use crate::error::TaxError;
use crate::store::{div_round_half_up, Money};
use serde::{Deserialize, Serialize};

/// One band of a bracket table: income above `lower` is taxed at `rate_bp`
/// basis points up to the next band's lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub lower: Money,
    pub rate_bp: u32,
}

impl Bracket {
    pub const fn new(lower_dollars: i64, rate_bp: u32) -> Self {
        Self { lower: Money::from_dollars(lower_dollars), rate_bp }
    }
}

/// The bands for one filing status, lowest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BracketTable {
    brackets: Vec<Bracket>,
}

impl BracketTable {
    pub fn new(brackets: Vec<Bracket>) -> Result<Self, TaxError> {
        let table = Self { brackets };
        table.validate()?;
        Ok(table)
    }

    /// For built-in tables whose shape is covered by tests.
    pub(crate) fn from_validated(brackets: Vec<Bracket>) -> Self { Self { brackets } }

    pub fn brackets(&self) -> &[Bracket] { &self.brackets }

    /// A table must start at zero, ascend strictly and carry rates within 0..=100%.
    pub fn validate(&self) -> Result<(), TaxError> {
        match self.brackets.first() {
            Some(first) if first.lower.is_zero() => {}
            _ => return Err(TaxError::Config("bracket table must start at 0".into())),
        }
        for pair in self.brackets.windows(2) {
            if pair[1].lower <= pair[0].lower {
                return Err(TaxError::Config(format!(
                    "bracket bounds must ascend ({} follows {})",
                    pair[1].lower, pair[0].lower
                )));
            }
        }
        if let Some(bad) = self.brackets.iter().find(|b| b.rate_bp > 10_000) {
            return Err(TaxError::Config(format!("bracket rate {}bp exceeds 100%", bad.rate_bp)));
        }
        Ok(())
    }

    fn upper_of(&self, index: usize) -> Option<Money> {
        self.brackets.get(index + 1).map(|next| next.lower)
    }
}

/// Computes the tax on `taxable_income` by the progressive-bracket formula.
///
/// The sum over bands is carried exactly (cents x basis points) and rounded
/// half-up to a whole currency unit once, at the end.
pub fn bracket_tax(taxable_income: Money, table: &BracketTable) -> Result<Money, TaxError> {
    if taxable_income.is_negative() {
        return Err(TaxError::NegativeAmount { rule: "bracket_tax", amount: taxable_income.to_string() });
    }
    let income = taxable_income.cents() as i128;
    let mut weighted: i128 = 0;

    for (i, bracket) in table.brackets.iter().enumerate() {
        let lower = bracket.lower.cents() as i128;
        if income <= lower {
            break;
        }
        let top = match table.upper_of(i) {
            Some(upper) => income.min(upper.cents() as i128),
            None => income,
        };
        weighted += (top - lower) * bracket.rate_bp as i128;
    }

    // cents * bp -> whole dollars
    let dollars = div_round_half_up(weighted, 100 * 10_000);
    Ok(Money::from_dollars(dollars as i64))
}

/// Rate (basis points) applied to the next dollar of income.
pub fn marginal_rate(taxable_income: Money, table: &BracketTable) -> u32 {
    table
        .brackets
        .iter()
        .rev()
        .find(|b| taxable_income >= b.lower)
        .map_or(0, |b| b.rate_bp)
}
