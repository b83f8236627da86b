//! Standard deduction lookup (Form 1040 line 12).
use crate::error::TaxError;
use crate::store::{FilingStatus, Money};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base amount per filing status plus the per-condition additional amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionTable {
    pub base: BTreeMap<FilingStatus, Money>,
    pub additional: BTreeMap<FilingStatus, Money>,
}

impl DeductionTable {
    pub fn validate(&self) -> Result<(), TaxError> {
        for status in FilingStatus::ALL {
            for (name, column) in [("base", &self.base), ("additional", &self.additional)] {
                match column.get(&status) {
                    Some(amount) if !amount.is_negative() => {}
                    Some(amount) => {
                        return Err(TaxError::Config(format!("negative {} deduction {} for {}", name, amount, status)))
                    }
                    None => return Err(TaxError::Config(format!("no {} deduction for {}", name, status))),
                }
            }
        }
        Ok(())
    }
}

/// The age/blindness conditions that raise the standard deduction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeductionFactors {
    pub taxpayer_65_or_older: bool,
    pub taxpayer_blind: bool,
    pub spouse_65_or_older: bool,
    pub spouse_blind: bool,
}

impl DeductionFactors {
    /// Number of additional amounts earned. Each condition counts once; spouse
    /// conditions count only for joint filers and surviving spouses.
    pub fn count(&self, status: FilingStatus) -> u32 {
        let own = self.taxpayer_65_or_older as u32 + self.taxpayer_blind as u32;
        let spouse = if status.counts_spouse() {
            self.spouse_65_or_older as u32 + self.spouse_blind as u32
        } else {
            0
        };
        own + spouse
    }
}

pub fn standard_deduction(
    status: FilingStatus,
    factors: DeductionFactors,
    table: &DeductionTable,
) -> Result<Money, TaxError> {
    let missing = || TaxError::Config(format!("no standard deduction for {}", status));
    let base = *table.base.get(&status).ok_or_else(missing)?;
    let increment = *table.additional.get(&status).ok_or_else(missing)?;
    increment
        .checked_mul(factors.count(status) as i64)
        .and_then(|extra| base.checked_add(extra))
        .ok_or_else(|| TaxError::Overflow { context: format!("standard deduction for {}", status) })
}
