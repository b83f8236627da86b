//! The form module contract.
//!
//! A module sees the ledger only through a [`LedgerView`] restricted to its
//! declared inputs, and can only hand results back as a [`LineSet`] built by
//! [`FormOutput`]. `FormOutput` is the single place where provenance for
//! computed and agent-derived lines is minted, so a rule-governed line can only
//! come from evaluating its rule.
use super::reasoner::{DerivationRequest, LineReasoner};
use crate::compute::{Ledger, LineSource};
use crate::config::TaxYearConfig;
use crate::error::{TaxError, Violation};
use crate::graph::{FormNode, LineSpec};
use crate::store::{FormId, LineKey, LineValue, Provenance, Value};
use std::collections::{BTreeMap, BTreeSet};

pub trait FormModule: Send + Sync {
    fn node(&self) -> &FormNode;

    fn required_inputs(&self) -> BTreeSet<LineKey> { self.node().required_inputs() }

    /// Produces every declared line, or fails without producing any.
    fn process(&self, view: &LedgerView<'_>) -> Result<LineSet, TaxError>;
}

/// The complete output of one form, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSet {
    form: FormId,
    lines: Vec<(LineKey, LineValue)>,
}

impl LineSet {
    pub fn form(&self) -> &FormId { &self.form }
    pub fn lines(&self) -> &[(LineKey, LineValue)] { &self.lines }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn into_lines(self) -> Vec<(LineKey, LineValue)> { self.lines }
}

/// Read access to the ledger, limited to a node's declared inputs.
pub struct LedgerView<'a> {
    node: &'a FormNode,
    allowed: BTreeSet<LineKey>,
    ledger: &'a Ledger,
    config: &'a TaxYearConfig,
    reasoner: &'a dyn LineReasoner,
}

impl<'a> LedgerView<'a> {
    pub(crate) fn new(
        node: &'a FormNode,
        allowed: BTreeSet<LineKey>,
        ledger: &'a Ledger,
        config: &'a TaxYearConfig,
        reasoner: &'a dyn LineReasoner,
    ) -> Self {
        Self { node, allowed, ledger, config, reasoner }
    }

    pub fn form(&self) -> &FormId { self.node.id() }
    pub fn config(&self) -> &TaxYearConfig { self.config }

    /// Starts building this form's output.
    pub fn output(&self) -> FormOutput<'_> { FormOutput { view: self, lines: BTreeMap::new(), order: Vec::new() } }

    fn violation(&self, key: &LineKey, violation: Violation) -> TaxError {
        TaxError::ContractViolation { form: self.node.id().clone(), key: key.clone(), violation }
    }
}

impl LineSource for LedgerView<'_> {
    fn line(&self, key: &LineKey) -> Result<&LineValue, TaxError> {
        if !self.allowed.contains(key) {
            return Err(self.violation(key, Violation::UndeclaredRead));
        }
        self.ledger.get(key)
    }
}

/// Builder for a [`LineSet`]. Lines already produced are readable by later
/// lines of the same form.
pub struct FormOutput<'v> {
    view: &'v LedgerView<'v>,
    lines: BTreeMap<LineKey, LineValue>,
    order: Vec<LineKey>,
}

impl<'v> FormOutput<'v> {
    pub fn get(&self, key: &LineKey) -> Result<&Value, TaxError> { self.value(key) }

    /// Evaluates the line's declared formula.
    pub fn compute(&mut self, key: &LineKey) -> Result<&Value, TaxError> {
        let spec = self.writable(key)?;
        let formula = spec.formula.clone().ok_or_else(|| self.view.violation(key, Violation::NoFormula))?;
        let value = formula.evaluate(&*self, self.view.config)?;
        let provenance = Provenance::computed(self.view.form().clone(), formula);
        self.insert(key, LineValue::with_provenance(value, provenance))
    }

    pub fn compute_all(&mut self, keys: &[LineKey]) -> Result<(), TaxError> {
        for key in keys {
            self.compute(key)?;
        }
        Ok(())
    }

    /// Asks the reasoning delegate for a composite or free line.
    pub fn reason(&mut self, key: &LineKey) -> Result<&Value, TaxError> {
        let spec = self.agent_writable(key)?;
        let formula = spec.formula.clone();
        let inputs: Vec<LineKey> = match &formula {
            Some(f) => f.inputs().cloned().collect(),
            None => self.view.allowed.iter().cloned().collect(),
        };
        let mut known = BTreeMap::new();
        for input in inputs {
            known.insert(input.clone(), self.line(&input)?.clone());
        }

        let request = DerivationRequest { form: self.view.form(), key, formula: formula.as_ref(), inputs: known };
        let value = self.view.reasoner.derive(&request).map_err(|message| TaxError::Reasoning {
            form: self.view.form().clone(),
            key: key.clone(),
            message,
        })?;
        let provenance = Provenance::agent(self.view.form().clone(), formula);
        self.insert(key, LineValue::with_provenance(value, provenance))
    }

    /// Records a value the module derived itself. Never allowed for rule-governed lines.
    pub fn derive(&mut self, key: &LineKey, value: impl Into<Value>) -> Result<&Value, TaxError> {
        let formula = self.agent_writable(key)?.formula.clone();
        let provenance = Provenance::agent(self.view.form().clone(), formula);
        self.insert(key, LineValue::with_provenance(value.into(), provenance))
    }

    /// Fails with `MissingOutput` unless every declared line was produced.
    pub fn finish(self) -> Result<LineSet, TaxError> {
        if let Some(missing) = self.view.node.produced_keys().find(|k| !self.lines.contains_key(*k)) {
            return Err(self.view.violation(missing, Violation::MissingOutput));
        }
        let mut lines = self.lines;
        let ordered = self
            .order
            .into_iter()
            .filter_map(|key| lines.remove(&key).map(|value| (key, value)))
            .collect();
        Ok(LineSet { form: self.view.form().clone(), lines: ordered })
    }

    fn writable(&self, key: &LineKey) -> Result<&'v LineSpec, TaxError> {
        let spec = self.view.node.output(key).ok_or_else(|| self.view.violation(key, Violation::UndeclaredWrite))?;
        if self.lines.contains_key(key) {
            return Err(self.view.violation(key, Violation::DuplicateOutput));
        }
        Ok(spec)
    }

    fn agent_writable(&self, key: &LineKey) -> Result<&'v LineSpec, TaxError> {
        let spec = self.writable(key)?;
        if spec.is_rule_governed() {
            return Err(self.view.violation(key, Violation::RuleGoverned));
        }
        Ok(spec)
    }

    fn insert(&mut self, key: &LineKey, value: LineValue) -> Result<&Value, TaxError> {
        self.order.push(key.clone());
        let slot = self.lines.entry(key.clone()).or_insert(value);
        Ok(slot.value())
    }
}

impl LineSource for FormOutput<'_> {
    fn line(&self, key: &LineKey) -> Result<&LineValue, TaxError> {
        if let Some(value) = self.lines.get(key) {
            return Ok(value);
        }
        if self.view.node.output(key).is_some() {
            // Own line read before it was produced.
            return Err(TaxError::MissingLine { key: key.clone() });
        }
        self.view.line(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::reasoner::DeterministicReasoner;
    use crate::rules::{Composite, Rule};
    use crate::store::{FilingStatus, Derivation, Money};

    const WAGES: LineKey = LineKey::from_static("w2.0", "box1");
    const STATUS: LineKey = LineKey::from_static("taxpayer", "filing_status");
    const SECRET: LineKey = LineKey::from_static("w2.0", "box2");
    const TOTAL: LineKey = LineKey::from_static("demo", "total");
    const TAXABLE: LineKey = LineKey::from_static("demo", "taxable");
    const TAX: LineKey = LineKey::from_static("demo", "tax");
    const NOTE: LineKey = LineKey::from_static("demo", "note");

    fn node() -> FormNode {
        FormNode::new(FormId::from_static("demo"))
            .composite(TOTAL, Composite::sum([WAGES]))
            .composite(TAXABLE, Composite::sum([TOTAL]).floored())
            .rule(TAX, Rule::BracketTax, [TAXABLE, STATUS])
            .produces(NOTE)
    }

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.seed(WAGES, Money::from_dollars(35_400)).unwrap();
        ledger.seed(SECRET, Money::from_dollars(5_000)).unwrap();
        ledger.seed(STATUS, Value::Status(FilingStatus::Single)).unwrap();
        ledger
    }

    fn with_view<R>(f: impl FnOnce(&LedgerView<'_>) -> R) -> R {
        let node = node();
        let ledger = ledger();
        let config = TaxYearConfig::ty2024();
        let reasoner = DeterministicReasoner;
        let view = LedgerView::new(&node, node.required_inputs(), &ledger, &config, &reasoner);
        f(&view)
    }

    #[test]
    fn test_full_output_with_provenance() {
        let set = with_view(|view| {
            let mut out = view.output();
            out.reason(&TOTAL)?;
            out.compute_all(&[TAXABLE, TAX])?;
            out.derive(&NOTE, Value::Flag(true))?;
            out.finish()
        })
        .unwrap();

        let keys: Vec<&LineKey> = set.lines().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&TOTAL, &TAXABLE, &TAX, &NOTE]);
        let (_, tax) = &set.lines()[2];
        assert_eq!(tax.value(), &Value::Money(Money::from_dollars(4_016)));
        assert_eq!(tax.provenance().derivation(), Derivation::RuleComputed);
        assert_eq!(set.lines()[0].1.provenance().derivation(), Derivation::AgentDerived);
        assert!(set.lines()[0].1.provenance().formula().is_some());
    }

    #[test]
    fn test_rule_lines_refuse_reasoning_and_derivation() {
        with_view(|view| {
            let mut out = view.output();
            let err = out.derive(&TAX, Money::from_dollars(4_027)).unwrap_err();
            assert!(matches!(err, TaxError::ContractViolation { violation: Violation::RuleGoverned, .. }));
            let err = out.reason(&TAX).unwrap_err();
            assert!(matches!(err, TaxError::ContractViolation { violation: Violation::RuleGoverned, .. }));
        });
    }

    #[test]
    fn test_undeclared_read_and_write() {
        with_view(|view| {
            let err = view.line(&SECRET).unwrap_err();
            assert_eq!(
                err,
                TaxError::ContractViolation {
                    form: FormId::from_static("demo"),
                    key: SECRET,
                    violation: Violation::UndeclaredRead
                }
            );
            let mut out = view.output();
            let err = out.derive(&LineKey::from_static("f1040", "34"), Money::ZERO).unwrap_err();
            assert!(matches!(err, TaxError::ContractViolation { violation: Violation::UndeclaredWrite, .. }));
        });
    }

    #[test]
    fn test_missing_duplicate_and_out_of_order() {
        with_view(|view| {
            let mut out = view.output();
            // TAXABLE reads TOTAL, which is not produced yet.
            assert!(matches!(out.compute(&TAXABLE), Err(TaxError::MissingLine { .. })));
            out.compute(&TOTAL).unwrap();
            let err = out.compute(&TOTAL).unwrap_err();
            assert!(matches!(err, TaxError::ContractViolation { violation: Violation::DuplicateOutput, .. }));
            let err = out.compute(&NOTE).unwrap_err();
            assert!(matches!(err, TaxError::ContractViolation { violation: Violation::NoFormula, .. }));
            let err = out.finish().unwrap_err();
            assert!(matches!(err, TaxError::ContractViolation { violation: Violation::MissingOutput, .. }));
        });
    }
}
