//! Schedule 1 adjustments: educator expenses, student loan interest and the
//! excess business loss add-back.
use crate::error::TaxError;
use crate::store::{div_round_half_up, FilingStatus, Money};
use serde::{Deserialize, Serialize};

/// Income range over which a benefit phases out linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOut {
    pub start: Money,
    pub end: Money,
}

impl PhaseOut {
    pub const fn new(start_dollars: i64, end_dollars: i64) -> Self {
        Self { start: Money::from_dollars(start_dollars), end: Money::from_dollars(end_dollars) }
    }

    /// `amount` reduced by the share of the range that `income` has crossed.
    pub fn apply(&self, amount: Money, income: Money) -> Money {
        if income <= self.start {
            return amount;
        }
        if income >= self.end {
            return Money::ZERO;
        }
        let crossed = (income - self.start).cents() as i128;
        let width = (self.end - self.start).cents() as i128;
        let reduction = div_round_half_up(amount.cents() as i128 * crossed, width);
        amount - Money::from_cents(reduction as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentParams {
    pub educator_expense_limit: Money,
    pub student_loan_interest_limit: Money,
    pub student_loan_phase_out: PhaseOut,
    pub student_loan_phase_out_joint: PhaseOut,
    pub excess_business_loss_threshold: Money,
    pub excess_business_loss_threshold_joint: Money,
}

impl AdjustmentParams {
    pub fn validate(&self) -> Result<(), TaxError> {
        for range in [self.student_loan_phase_out, self.student_loan_phase_out_joint] {
            if range.start.is_negative() || range.end <= range.start {
                return Err(TaxError::Config(format!("phase-out range {}..{} is empty", range.start, range.end)));
            }
        }
        let limits = [
            self.educator_expense_limit,
            self.student_loan_interest_limit,
            self.excess_business_loss_threshold,
            self.excess_business_loss_threshold_joint,
        ];
        if limits.iter().any(|m| m.is_negative()) {
            return Err(TaxError::Config("adjustment limits must be non-negative".into()));
        }
        Ok(())
    }
}

fn non_negative(rule: &'static str, amount: Money) -> Result<Money, TaxError> {
    if amount.is_negative() {
        return Err(TaxError::NegativeAmount { rule, amount: amount.to_string() });
    }
    Ok(amount)
}

/// One person's educator expenses and whether they qualify as an eligible educator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Educator {
    pub paid: Money,
    pub eligible: bool,
}

impl Educator {
    fn deductible(self, limit: Money) -> Result<Money, TaxError> {
        let paid = non_negative("educator_expense", self.paid)?;
        Ok(if self.eligible { paid.min(limit) } else { Money::ZERO })
    }
}

/// Educator expenses, capped per eligible educator. The spouse's expenses
/// count only on a joint return.
pub fn educator_expense(
    taxpayer: Educator,
    spouse: Educator,
    status: FilingStatus,
    params: &AdjustmentParams,
) -> Result<Money, TaxError> {
    let own = taxpayer.deductible(params.educator_expense_limit)?;
    let spouse = match status {
        FilingStatus::MarriedFilingJointly => spouse.deductible(params.educator_expense_limit)?,
        _ => Money::ZERO,
    };
    Ok(own + spouse)
}

pub fn student_loan_interest(
    paid: Money,
    modified_agi: Money,
    status: FilingStatus,
    params: &AdjustmentParams,
) -> Result<Money, TaxError> {
    let capped = non_negative("student_loan_interest", paid)?.min(params.student_loan_interest_limit);
    let range = match status {
        FilingStatus::MarriedFilingJointly => params.student_loan_phase_out_joint,
        _ => params.student_loan_phase_out,
    };
    Ok(range.apply(capped, modified_agi))
}

/// The part of a business loss beyond the threshold, added back to income (Form 461).
pub fn excess_business_loss(net_profit: Money, status: FilingStatus, params: &AdjustmentParams) -> Money {
    let threshold = match status {
        FilingStatus::MarriedFilingJointly => params.excess_business_loss_threshold_joint,
        _ => params.excess_business_loss_threshold,
    };
    let excess = -(net_profit.cents() as i128) - threshold.cents() as i128;
    Money::from_cents(i64::try_from(excess.max(0)).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaxYearConfig;
    use rstest::rstest;

    fn params() -> AdjustmentParams { TaxYearConfig::ty2024().adjustments }

    fn educator(dollars: i64, eligible: bool) -> Educator { Educator { paid: Money::from_dollars(dollars), eligible } }

    #[rstest]
    #[case(FilingStatus::Single, 450, 200, 300)]
    #[case(FilingStatus::MarriedFilingJointly, 450, 200, 500)]
    #[case(FilingStatus::MarriedFilingJointly, 120, 900, 420)]
    #[case(FilingStatus::MarriedFilingSeparately, 120, 900, 120)]
    fn test_educator_expense(#[case] status: FilingStatus, #[case] paid: i64, #[case] spouse: i64, #[case] expected: i64) {
        let got = educator_expense(educator(paid, true), educator(spouse, true), status, &params()).unwrap();
        assert_eq!(got, Money::from_dollars(expected));
    }

    #[rstest]
    #[case(false, false, 0)]
    #[case(true, false, 300)]
    #[case(false, true, 200)]
    fn test_educator_expense_requires_eligibility(#[case] own: bool, #[case] spouse: bool, #[case] expected: i64) {
        let got = educator_expense(educator(450, own), educator(200, spouse), FilingStatus::MarriedFilingJointly, &params())
            .unwrap();
        assert_eq!(got, Money::from_dollars(expected));
    }

    #[test]
    fn test_excess_business_loss_does_not_wrap() {
        let got = excess_business_loss(Money::from_cents(i64::MIN), FilingStatus::Single, &params());
        assert!(got > Money::ZERO);
    }

    #[rstest]
    #[case(FilingStatus::Single, 3_000, 60_000, 2_500)]
    #[case(FilingStatus::Single, 3_000, 87_500, 1_250)]
    #[case(FilingStatus::Single, 1_000, 95_000, 0)]
    #[case(FilingStatus::HeadOfHousehold, 1_000, 80_000, 1_000)]
    #[case(FilingStatus::MarriedFilingJointly, 2_000, 180_000, 1_000)]
    #[case(FilingStatus::MarriedFilingJointly, 2_000, 150_000, 2_000)]
    fn test_student_loan_interest(#[case] status: FilingStatus, #[case] paid: i64, #[case] magi: i64, #[case] expected: i64) {
        let got = student_loan_interest(Money::from_dollars(paid), Money::from_dollars(magi), status, &params()).unwrap();
        assert_eq!(got, Money::from_dollars(expected));
    }

    #[test]
    fn test_phase_out_rounds_to_cents() {
        // 2,500 * 1/15,000 of the range = 0.1666.. -> 0.17
        let range = PhaseOut::new(80_000, 95_000);
        assert_eq!(range.apply(Money::from_dollars(2_500), Money::from_dollars(80_001)), Money::from_cents(2_499_83));
    }

    #[test]
    fn test_negative_payment_rejected() {
        let err = student_loan_interest(Money::from_dollars(-1), Money::ZERO, FilingStatus::Single, &params()).unwrap_err();
        assert!(matches!(err, TaxError::NegativeAmount { rule: "student_loan_interest", .. }));
    }

    #[test]
    fn test_excess_business_loss() {
        let p = params();
        assert_eq!(excess_business_loss(Money::from_dollars(-400_000), FilingStatus::Single, &p), Money::from_dollars(95_000));
        assert_eq!(excess_business_loss(Money::from_dollars(-400_000), FilingStatus::MarriedFilingJointly, &p), Money::ZERO);
        assert_eq!(excess_business_loss(Money::from_dollars(10_000), FilingStatus::Single, &p), Money::ZERO);
    }
}
