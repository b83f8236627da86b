//! End-to-end driver: standard forms for an input shape, compiled once and run
//! once per return on a fresh ledger, followed by verification.
use super::engine::{Engine, RunSummary};
use super::ledger::{Ledger, LedgerSnapshot};
use crate::config::TaxYearConfig;
use crate::error::TaxError;
use crate::forms::{raw_input_keys, standard_checks, standard_forms, DeterministicReasoner, Form, FormModule, LineReasoner};
use crate::graph::{DependencyGraph, Schedule};
use crate::input::{InputShape, TaxReturnInput};
use crate::store::{LineKey, Value};
use crate::validation::{VerificationReport, Verifier};
use serde::Serialize;
use std::collections::BTreeMap;

/// The terminal form's lines, emitted only for a verified run.
pub const TERMINAL_FORM: &str = "f1040";

pub struct TaxPipeline {
    config: TaxYearConfig,
    shape: InputShape,
    forms: Vec<Form>,
    schedule: Schedule,
    reasoner: Box<dyn LineReasoner>,
}

impl TaxPipeline {
    /// Builds and compiles the standard form set. Any structural problem in
    /// the form declarations is reported here, before a return is touched.
    pub fn new(config: TaxYearConfig, shape: InputShape) -> Result<Self, TaxError> {
        config.validate()?;
        let forms = standard_forms(&shape);
        let mut graph = DependencyGraph::new();
        graph.add_raw_inputs(raw_input_keys(&shape));
        for form in &forms {
            graph.add_node(form.node().clone());
        }
        let schedule = graph.compile()?;
        Ok(Self { config, shape, forms, schedule, reasoner: Box::new(DeterministicReasoner) })
    }

    /// Replaces the reasoning delegate.
    pub fn with_reasoner(mut self, reasoner: impl LineReasoner + 'static) -> Self {
        self.reasoner = Box::new(reasoner);
        self
    }

    pub fn shape(&self) -> &InputShape { &self.shape }
    pub fn schedule(&self) -> &Schedule { &self.schedule }
    pub fn config(&self) -> &TaxYearConfig { &self.config }

    /// Computes and verifies one return. Independent calls share nothing mutable.
    pub fn run(&self, input: &TaxReturnInput) -> Result<ReturnRun, TaxError> {
        if input.shape() != self.shape {
            return Err(TaxError::InvalidInput(format!(
                "input shape {:?} does not match the compiled shape {:?}",
                input.shape(),
                self.shape
            )));
        }
        let mut ledger = Ledger::new();
        input.seed(&mut ledger)?;

        let engine = Engine::new(&self.forms, &self.schedule, &self.config, self.reasoner.as_ref())?;
        let summary = engine.run(&mut ledger)?;

        let snapshot = ledger.into_snapshot();
        let report = Verifier::new(&self.config)
            .with_declarations(self.forms.iter().map(|form| form.node()))
            .with_checks(standard_checks())
            .verify(&snapshot);
        if report.passed() {
            tracing::info!(lines = snapshot.len(), "Return verified");
        } else {
            tracing::warn!(errors = report.errors().count(), "Return failed verification");
        }
        Ok(ReturnRun { summary, snapshot, report })
    }
}

#[derive(Debug, Clone)]
pub struct ReturnRun {
    pub summary: RunSummary,
    pub snapshot: LedgerSnapshot,
    pub report: VerificationReport,
}

/// Serializable record of the terminal form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalOutput {
    pub form: &'static str,
    pub lines: BTreeMap<String, Value>,
}

impl ReturnRun {
    /// True when verification found no error-severity discrepancy.
    pub fn is_verified(&self) -> bool { self.report.passed() }

    pub fn value(&self, key: &LineKey) -> Result<&Value, TaxError> { Ok(self.snapshot.get(key)?.value()) }

    /// The terminal form, or `None` if the run is not verified.
    pub fn terminal_output(&self) -> Option<TerminalOutput> {
        if !self.is_verified() {
            return None;
        }
        let lines = self
            .snapshot
            .form_lines(TERMINAL_FORM)
            .map(|e| (e.key.line().to_string(), *e.value.value()))
            .collect();
        Some(TerminalOutput { form: TERMINAL_FORM, lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::lines::*;
    use crate::forms::DerivationRequest;
    use crate::input::{Dependent, Form1099Int, W2};
    use crate::store::{FilingStatus, Money};
    use crate::validation::Severity;
    use std::thread;

    fn money(dollars: i64) -> Value { Value::Money(Money::from_dollars(dollars)) }

    fn wage_earner(status: FilingStatus) -> TaxReturnInput {
        let mut input = TaxReturnInput::new(status);
        input.w2.push(W2 {
            employer: Some("Acme".into()),
            wages: Money::from_dollars(50_000),
            federal_withholding: Money::from_dollars(5_000),
        });
        input
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn run(input: &TaxReturnInput) -> ReturnRun {
        TaxPipeline::new(TaxYearConfig::ty2024(), input.shape()).unwrap().run(input).unwrap()
    }

    #[test]
    fn test_single_wage_earner() {
        init_tracing();
        let result = run(&wage_earner(FilingStatus::Single));
        assert!(result.is_verified(), "{}", result.report);
        assert_eq!(result.value(&F1040_DEDUCTION).unwrap(), &money(14_600));
        assert_eq!(result.value(&F1040_TAXABLE_INCOME).unwrap(), &money(35_400));
        assert_eq!(result.value(&F1040_TAX).unwrap(), &money(4_016));
        assert_eq!(result.value(&F1040_TOTAL_TAX).unwrap(), &money(4_016));
        assert_eq!(result.value(&F1040_REFUND).unwrap(), &money(984));
        assert_eq!(result.value(&F1040_AMOUNT_OWED).unwrap(), &money(0));
        assert_eq!(result.summary.stages, 6);
    }

    #[test]
    fn test_joint_filers_use_joint_tables() {
        let result = run(&wage_earner(FilingStatus::MarriedFilingJointly));
        assert!(result.is_verified(), "{}", result.report);
        assert_eq!(result.value(&F1040_DEDUCTION).unwrap(), &money(29_200));
        assert_eq!(result.value(&F1040_TAXABLE_INCOME).unwrap(), &money(20_800));
        assert_eq!(result.value(&F1040_TAX).unwrap(), &money(2_080));
        assert_eq!(result.value(&F1040_REFUND).unwrap(), &money(2_920));
    }

    #[test]
    fn test_interest_flows_through_schedule_b() {
        let mut input = wage_earner(FilingStatus::Single);
        input.income_1099_int = vec![
            Form1099Int { payer: None, interest_income: Money::from_dollars(150) },
            Form1099Int { payer: None, interest_income: Money::from_dollars(100) },
        ];
        let result = run(&input);
        assert!(result.is_verified(), "{}", result.report);
        assert_eq!(result.value(&SCHEDULE_B_INTEREST).unwrap(), &money(250));
        assert_eq!(result.value(&F1040_INTEREST).unwrap(), &money(250));
        assert_eq!(result.value(&F1040_TOTAL_INCOME).unwrap(), &money(50_250));
        assert_eq!(result.value(&F1040_TAX).unwrap(), &money(4_046));
    }

    /// Adds a dollar to every composite it is asked for.
    struct OffByOne;

    impl LineReasoner for OffByOne {
        fn derive(&self, request: &DerivationRequest<'_>) -> Result<Value, String> {
            let honest = DeterministicReasoner.derive(request)?;
            match honest {
                Value::Money(m) if request.key == &SCHEDULE_B_INTEREST => Ok(Value::Money(m + Money::from_dollars(1))),
                other => Ok(other),
            }
        }
    }

    #[test]
    fn test_verifier_catches_reasoning_arithmetic() {
        init_tracing();
        let mut input = wage_earner(FilingStatus::Single);
        input.income_1099_int = vec![
            Form1099Int { payer: None, interest_income: Money::from_dollars(150) },
            Form1099Int { payer: None, interest_income: Money::from_dollars(100) },
        ];
        let pipeline = TaxPipeline::new(TaxYearConfig::ty2024(), input.shape()).unwrap().with_reasoner(OffByOne);
        let result = pipeline.run(&input).unwrap();

        assert!(!result.is_verified());
        assert!(result.terminal_output().is_none());
        let errors: Vec<_> = result.report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, SCHEDULE_B_INTEREST);
        assert_eq!(errors[0].expected, Some(money(250)));
        assert_eq!(errors[0].actual, Some(money(251)));
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn test_child_credit_and_terminal_output() {
        let mut input = wage_earner(FilingStatus::HeadOfHousehold);
        input.dependents.push(Dependent { name: "Kid".into(), relationship: None, qualifying_child: true });
        let result = run(&input);
        assert!(result.is_verified(), "{}", result.report);
        // 50,000 - 21,900 = 28,100 -> 1,655 + 11,550 * 12% = 3,041
        assert_eq!(result.value(&F1040_TAX).unwrap(), &money(3_041));
        assert_eq!(result.value(&F1040_CHILD_CREDIT).unwrap(), &money(2_000));

        let output = result.terminal_output().unwrap();
        assert_eq!(output.lines["22"], money(1_041));
        assert_eq!(output.lines["34"], money(3_959));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["lines"]["34"]["value"], "3959.00");
    }

    #[test]
    fn test_concurrent_runs_are_independent() {
        let pipeline = TaxPipeline::new(TaxYearConfig::ty2024(), wage_earner(FilingStatus::Single).shape()).unwrap();
        let refunds: Vec<Value> = thread::scope(|s| {
            let handles: Vec<_> = [FilingStatus::Single, FilingStatus::MarriedFilingJointly]
                .into_iter()
                .map(|status| {
                    let pipeline = &pipeline;
                    s.spawn(move || *pipeline.run(&wage_earner(status)).unwrap().value(&F1040_REFUND).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(refunds, vec![money(984), money(2_920)]);
    }

    #[test]
    fn test_educator_expense_needs_eligibility() {
        let mut input = wage_earner(FilingStatus::Single);
        input.adjustments.educator_expenses = Money::from_dollars(250);
        assert_eq!(run(&input).value(&SCHEDULE_1_EDUCATOR).unwrap(), &money(0));

        input.taxpayer.educator = true;
        let result = run(&input);
        assert!(result.is_verified(), "{}", result.report);
        assert_eq!(result.value(&SCHEDULE_1_EDUCATOR).unwrap(), &money(250));
        assert_eq!(result.value(&F1040_AGI).unwrap(), &money(49_750));
    }

    #[test]
    fn test_oversized_amounts_are_rejected_before_running() {
        let mut input = wage_earner(FilingStatus::Single);
        input.w2.push(W2 {
            employer: None,
            wages: Money::from_dollars(50_000_000_000_000_000),
            federal_withholding: Money::ZERO,
        });
        let pipeline = TaxPipeline::new(TaxYearConfig::ty2024(), input.shape()).unwrap();
        assert!(matches!(pipeline.run(&input), Err(TaxError::InvalidInput(_))));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let pipeline = TaxPipeline::new(TaxYearConfig::ty2024(), InputShape::default()).unwrap();
        let err = pipeline.run(&wage_earner(FilingStatus::Single)).unwrap_err();
        assert!(matches!(err, TaxError::InvalidInput(_)));
    }
}
