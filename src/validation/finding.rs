//! Verification findings and the report that collects them.
use crate::store::{LineKey, Value};
use serde::Serialize;
use std::fmt;

/// How much a finding matters.
///
/// Errors block a return from being reported as verified; warnings are
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A discrepancy or gap found while replaying a ledger snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationFinding {
    pub key: LineKey,
    /// The independently recomputed value, when one could be computed.
    pub expected: Option<Value>,
    /// The stored value, when the line exists.
    pub actual: Option<Value>,
    pub severity: Severity,
    /// Rule function name, `composite`, or the name of a cross-line check.
    pub rule: String,
    pub message: String,
}

impl fmt::Display for VerificationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        write!(
            f,
            "[{:?}] {} ({}): expected {}, actual {} - {}",
            self.severity,
            self.key,
            self.rule,
            show(&self.expected),
            show(&self.actual),
            self.message
        )
    }
}

/// Ordered findings for one snapshot: formula replays in ledger order, then
/// cross-line checks in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub findings: Vec<VerificationFinding>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool { self.errors().next().is_none() }

    pub fn errors(&self) -> impl Iterator<Item = &VerificationFinding> + '_ {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &VerificationFinding> + '_ {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "PASSED" } else { "FAILED" };
        writeln!(
            f,
            "Verification {}: {} error(s), {} warning(s)",
            verdict,
            self.errors().count(),
            self.warnings().count()
        )?;
        for finding in &self.findings {
            writeln!(f, "  {}", finding)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Money;

    fn finding(severity: Severity) -> VerificationFinding {
        VerificationFinding {
            key: LineKey::from_static("f1040", "16"),
            expected: Some(Value::Money(Money::from_dollars(4_016))),
            actual: Some(Value::Money(Money::from_dollars(4_027))),
            severity,
            rule: "bracket_tax".into(),
            message: "stored value differs from recomputation".into(),
        }
    }

    #[test]
    fn test_warnings_do_not_fail_a_report() {
        let report = VerificationReport { findings: vec![finding(Severity::Warning)] };
        assert!(report.passed());
        let report = VerificationReport { findings: vec![finding(Severity::Warning), finding(Severity::Error)] };
        assert!(!report.passed());
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn test_report_lists_expected_and_actual() {
        let report = VerificationReport { findings: vec![finding(Severity::Error)] };
        let text = report.to_string();
        assert!(text.starts_with("Verification FAILED: 1 error(s), 0 warning(s)"));
        assert!(text.contains("f1040:16 (bracket_tax): expected 4016.00, actual 4027.00"));
    }
}
