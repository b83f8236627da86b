use crate::store::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildTaxCreditParams {
    pub per_child: Money,
}

/// Nonrefundable child tax credit: a fixed amount per qualifying child, limited to the tax.
pub fn child_tax_credit(qualifying_children: u32, tax: Money, params: &ChildTaxCreditParams) -> Money {
    let full = params.per_child.cents() as i128 * qualifying_children as i128;
    let limit = tax.clamp_non_negative();
    // The result never exceeds the tax, so it fits even when `full` does not.
    Money::from_cents(full.min(limit.cents() as i128) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_limited_to_tax() {
        let params = ChildTaxCreditParams { per_child: Money::from_dollars(2_000) };
        assert_eq!(child_tax_credit(2, Money::from_dollars(10_000), &params), Money::from_dollars(4_000));
        assert_eq!(child_tax_credit(2, Money::from_dollars(2_080), &params), Money::from_dollars(2_080));
        assert_eq!(child_tax_credit(0, Money::from_dollars(2_080), &params), Money::ZERO);
    }

    #[test]
    fn test_huge_child_count_is_limited_not_wrapped() {
        let params = ChildTaxCreditParams { per_child: Money::from_cents(i64::MAX / 2) };
        let tax = Money::from_dollars(9_000);
        assert_eq!(child_tax_credit(u32::MAX, tax, &params), tax);
    }
}
