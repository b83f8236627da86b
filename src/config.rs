//! Year-specific tax parameters.
//!
//! A [`TaxYearConfig`] is versioned data: it is loaded (or built in) once,
//! validated, and then shared read-only by every run.
use crate::error::TaxError;
use crate::rules::{
    AdjustmentParams, Bracket, BracketTable, ChildTaxCreditParams, DeductionTable, PhaseOut, SelfEmploymentParams,
};
use crate::store::{FilingStatus, Money};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxYearConfig {
    pub year: u16,
    pub brackets: BTreeMap<FilingStatus, BracketTable>,
    pub standard_deduction: DeductionTable,
    pub self_employment: SelfEmploymentParams,
    pub adjustments: AdjustmentParams,
    pub child_tax_credit: ChildTaxCreditParams,
}

const RATES_BP: [u32; 7] = [1_000, 1_200, 2_200, 2_400, 3_200, 3_500, 3_700];

fn table(lowers: [i64; 7]) -> BracketTable {
    let brackets = lowers.iter().zip(RATES_BP).map(|(&lower, rate)| Bracket::new(lower, rate)).collect();
    BracketTable::from_validated(brackets)
}

impl TaxYearConfig {
    /// The built-in 2024 parameters.
    pub fn ty2024() -> Self {
        use FilingStatus::*;

        let single = table([0, 11_600, 47_150, 100_525, 191_950, 243_725, 609_350]);
        let joint = table([0, 23_200, 94_300, 201_050, 383_900, 487_450, 731_200]);
        let separate = table([0, 11_600, 47_150, 100_525, 191_950, 243_725, 365_600]);
        let head = table([0, 16_550, 63_100, 100_500, 191_950, 243_700, 609_350]);

        let brackets = BTreeMap::from([
            (Single, single),
            (MarriedFilingJointly, joint.clone()),
            (MarriedFilingSeparately, separate),
            (HeadOfHousehold, head),
            (QualifyingSurvivingSpouse, joint),
        ]);

        let base = BTreeMap::from([
            (Single, Money::from_dollars(14_600)),
            (MarriedFilingJointly, Money::from_dollars(29_200)),
            (MarriedFilingSeparately, Money::from_dollars(14_600)),
            (HeadOfHousehold, Money::from_dollars(21_900)),
            (QualifyingSurvivingSpouse, Money::from_dollars(29_200)),
        ]);
        let additional = FilingStatus::ALL
            .into_iter()
            .map(|status| {
                let amount = match status {
                    Single | HeadOfHousehold => 1_950,
                    _ => 1_550,
                };
                (status, Money::from_dollars(amount))
            })
            .collect();

        Self {
            year: 2024,
            brackets,
            standard_deduction: DeductionTable { base, additional },
            self_employment: SelfEmploymentParams {
                net_earnings_rate_bp: 9_235,
                social_security_rate_bp: 1_240,
                medicare_rate_bp: 290,
                wage_base: Money::from_dollars(168_600),
                minimum_net_earnings: Money::from_dollars(400),
            },
            adjustments: AdjustmentParams {
                educator_expense_limit: Money::from_dollars(300),
                student_loan_interest_limit: Money::from_dollars(2_500),
                student_loan_phase_out: PhaseOut::new(80_000, 95_000),
                student_loan_phase_out_joint: PhaseOut::new(165_000, 195_000),
                excess_business_loss_threshold: Money::from_dollars(305_000),
                excess_business_loss_threshold_joint: Money::from_dollars(610_000),
            },
            child_tax_credit: ChildTaxCreditParams { per_child: Money::from_dollars(2_000) },
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TaxError> {
        let config: Self = serde_json::from_str(json).map_err(|e| TaxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TaxError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&raw)?;
        tracing::info!(year = config.year, path = %path.display(), "Loaded tax year configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TaxError> {
        for status in FilingStatus::ALL {
            self.brackets_for(status)?.validate()?;
        }
        self.standard_deduction.validate()?;
        self.self_employment.validate()?;
        self.adjustments.validate()?;
        if self.child_tax_credit.per_child.is_negative() {
            return Err(TaxError::Config("child tax credit must be non-negative".into()));
        }
        Ok(())
    }

    pub fn brackets_for(&self, status: FilingStatus) -> Result<&BracketTable, TaxError> {
        self.brackets
            .get(&status)
            .ok_or_else(|| TaxError::Config(format!("no bracket table for {}", status)))
    }
}
