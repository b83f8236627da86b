//! Self-employment tax (Schedule SE).
use crate::error::TaxError;
use crate::store::{div_round_half_up, Money};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfEmploymentParams {
    /// Share of net profit treated as net earnings (92.35%).
    pub net_earnings_rate_bp: u32,
    pub social_security_rate_bp: u32,
    pub medicare_rate_bp: u32,
    /// Earnings above this amount owe only the Medicare portion.
    pub wage_base: Money,
    /// Net earnings below this floor owe nothing.
    pub minimum_net_earnings: Money,
}

impl SelfEmploymentParams {
    pub fn validate(&self) -> Result<(), TaxError> {
        for (name, bp) in [
            ("net earnings", self.net_earnings_rate_bp),
            ("social security", self.social_security_rate_bp),
            ("medicare", self.medicare_rate_bp),
        ] {
            if bp > 10_000 {
                return Err(TaxError::Config(format!("{} rate {}bp exceeds 100%", name, bp)));
            }
        }
        if self.wage_base.is_negative() || self.minimum_net_earnings.is_negative() {
            return Err(TaxError::Config("self-employment thresholds must be non-negative".into()));
        }
        Ok(())
    }
}

/// Breakdown of one self-employment tax computation. Every component is
/// rounded half-up to the cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SelfEmploymentTax {
    pub net_earnings: Money,
    pub social_security: Money,
    pub medicare: Money,
    pub total: Money,
    /// Half of the total, deductible on Schedule 1.
    pub deductible_half: Money,
}

pub fn self_employment_tax(net_profit: Money, params: &SelfEmploymentParams) -> SelfEmploymentTax {
    if net_profit <= Money::ZERO {
        return SelfEmploymentTax::default();
    }
    let net_earnings = net_profit.scale_bp(params.net_earnings_rate_bp);
    if net_earnings < params.minimum_net_earnings {
        return SelfEmploymentTax::default();
    }

    let social_security = net_earnings.min(params.wage_base).scale_bp(params.social_security_rate_bp);
    let medicare = net_earnings.scale_bp(params.medicare_rate_bp);
    let total = social_security + medicare;
    let deductible_half = Money::from_cents(div_round_half_up(total.cents() as i128, 2) as i64);

    SelfEmploymentTax { net_earnings, social_security, medicare, total, deductible_half }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaxYearConfig;
    use proptest::prelude::*;

    fn params() -> SelfEmploymentParams { TaxYearConfig::ty2024().self_employment }

    #[test]
    fn test_typical_profit() {
        let se = self_employment_tax(Money::from_dollars(50_000), &params());
        assert_eq!(se.net_earnings, Money::from_dollars(46_175));
        assert_eq!(se.social_security, Money::from_cents(5_725_70));
        // 1,339.075 rounds half-up
        assert_eq!(se.medicare, Money::from_cents(1_339_08));
        assert_eq!(se.total, Money::from_cents(7_064_78));
        assert_eq!(se.deductible_half, Money::from_cents(3_532_39));
    }

    #[test]
    fn test_floor_and_losses_owe_nothing() {
        let p = params();
        assert_eq!(self_employment_tax(Money::from_dollars(400), &p), SelfEmploymentTax::default());
        assert_eq!(self_employment_tax(Money::from_dollars(-10_000), &p), SelfEmploymentTax::default());
        // 434 * 92.35% = 400.80, just over the floor
        assert!(self_employment_tax(Money::from_dollars(434), &p).total > Money::ZERO);
    }

    #[test]
    fn test_social_security_capped_at_wage_base() {
        let p = params();
        let se = self_employment_tax(Money::from_dollars(300_000), &p);
        assert_eq!(se.social_security, Money::from_cents(20_906_40));
        assert_eq!(se.medicare, se.net_earnings.scale_bp(290));
    }

    proptest! {
        #[test]
        fn prop_only_medicare_above_wage_base(extra in 0i64..50_000_000, step in 1i64..10_000_000) {
            let p = params();
            // Net profit large enough that net earnings clear the wage base.
            let base_profit = Money::from_dollars(183_000) + Money::from_cents(extra);
            let lo = self_employment_tax(base_profit, &p);
            let hi = self_employment_tax(base_profit + Money::from_cents(step), &p);
            prop_assert_eq!(lo.social_security, p.wage_base.scale_bp(p.social_security_rate_bp));
            prop_assert_eq!(lo.social_security, hi.social_security);
            prop_assert!(hi.medicare >= lo.medicare);
        }

        #[test]
        fn prop_deterministic(cents in -10_000_000i64..100_000_000) {
            let p = params();
            prop_assert_eq!(self_employment_tax(Money::from_cents(cents), &p), self_employment_tax(Money::from_cents(cents), &p));
        }
    }
}
