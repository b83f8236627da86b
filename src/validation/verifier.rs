//! Independent replay of a finished ledger.
//!
//! The verifier never trusts a stored value. Every line that carries a
//! formula is recomputed from the snapshot and compared exactly; the
//! configured cross-line checks run afterwards.
//!
//! Given the form declarations, it also refuses to trust the recorded
//! formula: a declared line must carry exactly the formula it was declared
//! with, and a rule-governed line must have been computed by its rule.
use super::checks::Check;
use super::finding::{Severity, VerificationFinding, VerificationReport};
use crate::compute::{LedgerEntry, LedgerSnapshot};
use crate::config::TaxYearConfig;
use crate::graph::FormNode;
use crate::rules::Formula;
use crate::store::{Derivation, LineKey};
use std::collections::HashMap;
use tracing::debug;

pub struct Verifier<'a> {
    config: &'a TaxYearConfig,
    checks: Vec<Check>,
    declared: HashMap<LineKey, Formula>,
}

impl<'a> Verifier<'a> {
    pub fn new(config: &'a TaxYearConfig) -> Self {
        Self { config, checks: Vec::new(), declared: HashMap::new() }
    }

    /// Records the formula each line was declared with.
    pub fn with_declarations<'n>(mut self, nodes: impl IntoIterator<Item = &'n FormNode>) -> Self {
        for node in nodes {
            for spec in node.outputs() {
                if let Some(formula) = &spec.formula {
                    self.declared.insert(spec.key.clone(), formula.clone());
                }
            }
        }
        self
    }

    pub fn with_checks(mut self, checks: Vec<Check>) -> Self {
        self.checks = checks;
        self
    }

    /// Pure function of the snapshot and configuration: running it twice
    /// yields the same report.
    pub fn verify(&self, snapshot: &LedgerSnapshot) -> VerificationReport {
        let mut findings: Vec<VerificationFinding> =
            snapshot.entries().iter().filter_map(|entry| self.replay(snapshot, entry)).collect();
        findings.extend(self.checks.iter().filter_map(|check| check.evaluate(snapshot)));

        let report = VerificationReport { findings };
        debug!(
            lines = snapshot.len(),
            errors = report.errors().count(),
            warnings = report.warnings().count(),
            "Verification finished"
        );
        report
    }

    fn replay(&self, snapshot: &LedgerSnapshot, entry: &LedgerEntry) -> Option<VerificationFinding> {
        let provenance = entry.value.provenance();
        let actual = *entry.value.value();
        let finding = |expected, severity, rule: &str, message| VerificationFinding {
            key: entry.key.clone(),
            expected,
            actual: Some(actual),
            severity,
            rule: rule.to_string(),
            message,
        };

        if let Some(declared) = self.declared.get(&entry.key) {
            let recorded = provenance.formula();
            let forged_rule = declared.is_rule() && provenance.derivation() != Derivation::RuleComputed;
            if forged_rule || recorded != Some(declared) {
                let recorded = recorded.map_or_else(|| "no formula".to_string(), |f| f.to_string());
                return Some(finding(
                    declared.evaluate(snapshot, self.config).ok(),
                    Severity::Error,
                    declared.tag(),
                    format!("{:?} line carries {}, declared {}", provenance.derivation(), recorded, declared),
                ));
            }
        }

        match (provenance.derivation(), provenance.formula()) {
            (Derivation::RawInput, _) => None,
            (_, Some(formula)) => match formula.evaluate(snapshot, self.config) {
                Ok(expected) if expected == actual => None,
                Ok(expected) => Some(finding(
                    Some(expected),
                    Severity::Error,
                    formula.tag(),
                    format!("stored value differs from {}", formula),
                )),
                Err(err) => Some(finding(
                    None,
                    Severity::Error,
                    formula.tag(),
                    format!("cannot replay {}: {}", formula, err),
                )),
            },
            (Derivation::RuleComputed, None) => Some(finding(
                None,
                Severity::Error,
                "unverifiable",
                format!("rule-computed by {} with no formula", provenance.producer()),
            )),
            (Derivation::AgentDerived, None) => Some(finding(
                None,
                Severity::Warning,
                "unverifiable",
                format!("derived by {} with no replayable formula", provenance.producer()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Ledger;
    use crate::rules::{Composite, Rule};
    use crate::store::{FilingStatus, FormId, LineValue, Money, Provenance, Value};

    const STATUS: LineKey = LineKey::from_static("taxpayer", "filing_status");
    const TAXABLE: LineKey = LineKey::from_static("f1040", "15");
    const TAX: LineKey = LineKey::from_static("f1040", "16");
    const F1040: FormId = FormId::from_static("f1040");

    fn ledger_with_tax(stored: i64) -> Ledger {
        let mut ledger = Ledger::new();
        ledger.seed(STATUS, Value::Status(FilingStatus::Single)).unwrap();
        ledger.seed(TAXABLE, Money::from_dollars(35_400)).unwrap();
        let formula = Formula::rule(Rule::BracketTax, [TAXABLE, STATUS]);
        let value = LineValue::with_provenance(
            Value::Money(Money::from_dollars(stored)),
            Provenance::computed(F1040, formula),
        );
        ledger.put(TAX, value).unwrap();
        ledger
    }

    #[test]
    fn test_correct_ledger_passes() {
        let config = TaxYearConfig::ty2024();
        let report = Verifier::new(&config).verify(&ledger_with_tax(4_016).into_snapshot());
        assert!(report.passed(), "{}", report);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_wrong_bracket_tax_is_flagged() {
        let config = TaxYearConfig::ty2024();
        let report = Verifier::new(&config).verify(&ledger_with_tax(4_027).into_snapshot());
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, TAX);
        assert_eq!(errors[0].rule, "bracket_tax");
        assert_eq!(errors[0].expected, Some(Value::Money(Money::from_dollars(4_016))));
        assert_eq!(errors[0].actual, Some(Value::Money(Money::from_dollars(4_027))));
    }

    #[test]
    fn test_verification_is_idempotent() {
        let config = TaxYearConfig::ty2024();
        let snapshot = ledger_with_tax(4_027).into_snapshot();
        let verifier = Verifier::new(&config).with_checks(vec![Check::NonNegative { key: TAXABLE }]);
        assert_eq!(verifier.verify(&snapshot), verifier.verify(&snapshot));
    }

    #[test]
    fn test_free_agent_line_is_a_warning() {
        let config = TaxYearConfig::ty2024();
        let mut ledger = Ledger::new();
        let note = LineKey::from_static("schedule_c", "note");
        ledger
            .put(note.clone(), LineValue::with_provenance(Value::Flag(true), Provenance::agent(FormId::from_static("schedule_c"), None)))
            .unwrap();
        let report = Verifier::new(&config).verify(&ledger.into_snapshot());
        assert!(report.passed());
        let warnings: Vec<_> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, note);
        assert_eq!(warnings[0].rule, "unverifiable");
    }

    fn tax_node() -> FormNode {
        FormNode::new(F1040).rule(TAX, Rule::BracketTax, [TAXABLE, STATUS])
    }

    fn ledger_with_agent_tax(formula: Option<Formula>) -> Ledger {
        let mut ledger = Ledger::new();
        ledger.seed(STATUS, Value::Status(FilingStatus::Single)).unwrap();
        ledger.seed(TAXABLE, Money::from_dollars(35_400)).unwrap();
        let value = LineValue::with_provenance(Value::Money(Money::from_dollars(4_027)), Provenance::agent(F1040, formula));
        ledger.put(TAX, value).unwrap();
        ledger
    }

    #[test]
    fn test_agent_value_on_rule_line_is_an_error() {
        let config = TaxYearConfig::ty2024();
        let node = tax_node();
        let verifier = Verifier::new(&config).with_declarations([&node]);

        let report = verifier.verify(&ledger_with_agent_tax(None).into_snapshot());
        assert!(!report.passed(), "{}", report);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, TAX);
        assert_eq!(errors[0].rule, "bracket_tax");
        assert_eq!(errors[0].expected, Some(Value::Money(Money::from_dollars(4_016))));
        assert_eq!(report.warnings().count(), 0);

        // Recording the right formula does not make an agent value rule-computed.
        let honest_looking = Formula::rule(Rule::BracketTax, [TAXABLE, STATUS]);
        let report = verifier.verify(&ledger_with_agent_tax(Some(honest_looking)).into_snapshot());
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn test_recorded_formula_must_match_declaration() {
        let config = TaxYearConfig::ty2024();
        let node = tax_node();
        let mut ledger = Ledger::new();
        ledger.seed(STATUS, Value::Status(FilingStatus::Single)).unwrap();
        ledger.seed(TAXABLE, Money::from_dollars(35_400)).unwrap();
        // A composite that happens to reproduce the stored value.
        let formula = Formula::Composite(Composite::sum([TAXABLE]));
        let value = LineValue::with_provenance(Value::Money(Money::from_dollars(35_400)), Provenance::computed(F1040, formula));
        ledger.put(TAX, value).unwrap();

        let report = Verifier::new(&config).with_declarations([&node]).verify(&ledger.into_snapshot());
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("declared bracket_tax"), "{}", errors[0]);
    }

    #[test]
    fn test_declared_and_correct_ledger_passes() {
        let config = TaxYearConfig::ty2024();
        let node = tax_node();
        let report = Verifier::new(&config).with_declarations([&node]).verify(&ledger_with_tax(4_016).into_snapshot());
        assert!(report.findings.is_empty(), "{}", report);
    }

    #[test]
    fn test_unreplayable_formula_is_an_error() {
        let config = TaxYearConfig::ty2024();
        let mut ledger = Ledger::new();
        let total = LineKey::from_static("schedule_b", "4");
        let formula = Formula::Composite(Composite::sum([LineKey::from_static("schedule_b", "2")]));
        ledger
            .put(total.clone(), LineValue::with_provenance(Value::Money(Money::ZERO), Provenance::agent(FormId::from_static("schedule_b"), Some(formula))))
            .unwrap();
        let report = Verifier::new(&config).verify(&ledger.into_snapshot());
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "composite");
        assert_eq!(errors[0].expected, None);
    }
}
