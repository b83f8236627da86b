//! Interface to the natural-language reasoning layer.
//!
//! The reasoning layer decides how to combine inputs into composite or free
//! lines. It is never consulted for rule-governed lines, and whatever it
//! returns for a composite line is replayed by the verifier.
use crate::compute::LineSource;
use crate::error::TaxError;
use crate::rules::Formula;
use crate::store::{FormId, LineKey, LineValue, Value};
use std::collections::BTreeMap;

/// Everything the delegate may look at for one line.
#[derive(Debug)]
pub struct DerivationRequest<'a> {
    pub form: &'a FormId,
    pub key: &'a LineKey,
    /// The declared composite, if the line has one.
    pub formula: Option<&'a Formula>,
    pub inputs: BTreeMap<LineKey, LineValue>,
}

impl LineSource for DerivationRequest<'_> {
    fn line(&self, key: &LineKey) -> Result<&LineValue, TaxError> {
        self.inputs.get(key).ok_or_else(|| TaxError::MissingLine { key: key.clone() })
    }
}

/// External reasoning. Implementations own their timeouts and retries; a
/// failure is reported as a message and surfaces as `TaxError::Reasoning`.
pub trait LineReasoner: Send + Sync {
    fn derive(&self, request: &DerivationRequest<'_>) -> Result<Value, String>;
}

/// Stand-in delegate that re-sums the declared composite.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicReasoner;

impl LineReasoner for DeterministicReasoner {
    fn derive(&self, request: &DerivationRequest<'_>) -> Result<Value, String> {
        match request.formula {
            Some(Formula::Composite(composite)) => composite.evaluate(request).map_err(|e| e.to_string()),
            Some(other) => Err(format!("cannot derive '{}' by rule {}", request.key, other.tag())),
            None => Err(format!("no composite declared for free line '{}'", request.key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Composite, Rule};
    use crate::store::Money;

    const A: LineKey = LineKey::from_static("1099_int.0", "box1");
    const B: LineKey = LineKey::from_static("1099_int.1", "box1");
    const TOTAL: LineKey = LineKey::from_static("schedule_b", "2");

    #[test]
    fn test_deterministic_reasoner_sums_composites() {
        let formula = Formula::Composite(Composite::sum([A, B]));
        let form = FormId::from_static("schedule_b");
        let inputs = BTreeMap::from([
            (A, LineValue::raw(Money::from_dollars(150))),
            (B, LineValue::raw(Money::from_dollars(100))),
        ]);
        let request = DerivationRequest { form: &form, key: &TOTAL, formula: Some(&formula), inputs };
        assert_eq!(DeterministicReasoner.derive(&request), Ok(Value::Money(Money::from_dollars(250))));
    }

    #[test]
    fn test_deterministic_reasoner_refuses_free_and_rule_lines() {
        let form = FormId::from_static("schedule_b");
        let request = DerivationRequest { form: &form, key: &TOTAL, formula: None, inputs: BTreeMap::new() };
        assert!(DeterministicReasoner.derive(&request).is_err());

        let rule = Formula::rule(Rule::BracketTax, [A, B]);
        let request = DerivationRequest { form: &form, key: &TOTAL, formula: Some(&rule), inputs: BTreeMap::new() };
        assert!(DeterministicReasoner.derive(&request).unwrap_err().contains("bracket_tax"));
    }
}
