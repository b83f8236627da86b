use crate::compute::ledger::Ledger;
use crate::config::TaxYearConfig;
use crate::error::{TaxError, Violation};
use crate::forms::{FormModule, LedgerView, LineReasoner, LineSet};
use crate::graph::Schedule;
use crate::store::{Derivation, LineKey};
use rayon::prelude::*;
use tracing::{debug, debug_span, error, info, warn};

/// Counts from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub stages: usize,
    pub forms: usize,
    pub lines_written: usize,
}

/// Runs a compiled schedule of form modules against one ledger.
pub struct Engine<'a, M: FormModule> {
    modules: &'a [M],
    schedule: &'a Schedule,
    config: &'a TaxYearConfig,
    reasoner: &'a dyn LineReasoner,
}

impl<'a, M: FormModule> Engine<'a, M> {
    /// `modules` must be in the order they were added to the graph that
    /// produced `schedule`; the layout is checked here, before anything runs.
    pub fn new(
        modules: &'a [M],
        schedule: &'a Schedule,
        config: &'a TaxYearConfig,
        reasoner: &'a dyn LineReasoner,
    ) -> Result<Self, TaxError> {
        if modules.len() != schedule.len() {
            return Err(TaxError::ModuleCount { expected: schedule.len(), found: modules.len() });
        }
        for (slot, module) in modules.iter().enumerate() {
            let expected = schedule.form_id(slot);
            if module.node().id() != expected {
                return Err(TaxError::ModuleMismatch {
                    slot,
                    expected: expected.clone(),
                    found: module.node().id().clone(),
                });
            }
        }
        Ok(Self { modules, schedule, config, reasoner })
    }

    /// Executes stage by stage. Forms in a stage run in parallel against the
    /// ledger as it stood when the stage began; their outputs are committed in
    /// declaration order once every one of them has returned.
    ///
    /// A failing form does not stop its stage-mates. Their outputs are still
    /// committed, later stages never start, and the run returns `Aborted`.
    pub fn run(&self, ledger: &mut Ledger) -> Result<RunSummary, TaxError> {
        let mut summary = RunSummary::default();
        let stages = self.schedule.stages();

        for (index, stage) in stages.iter().enumerate() {
            debug!(stage = index, forms = stage.len(), "Starting stage");
            ledger.begin_stage(index);

            let reader: &Ledger = ledger;
            let results: Vec<(usize, Result<LineSet, TaxError>)> =
                stage.par_iter().map(|&form| (form, self.execute(form, reader))).collect();

            let mut failure: Option<(usize, TaxError)> = None;
            for (form, result) in results {
                match result.and_then(|set| self.commit(form, set, ledger)) {
                    Ok(written) => {
                        summary.forms += 1;
                        summary.lines_written += written;
                    }
                    Err(err) => {
                        error!(form = %self.schedule.form_id(form), error = %err, "Form failed");
                        failure.get_or_insert((form, err));
                    }
                }
            }

            if let Some((form, err)) = failure {
                let cancelled: Vec<_> =
                    stages[index + 1..].iter().flatten().map(|&i| self.schedule.form_id(i).clone()).collect();
                if !cancelled.is_empty() {
                    warn!(forms = ?cancelled, "Cancelled later stages");
                }
                return Err(TaxError::Aborted {
                    form: self.schedule.form_id(form).clone(),
                    source: Box::new(err),
                    cancelled,
                });
            }
            summary.stages += 1;
        }

        info!(stages = summary.stages, forms = summary.forms, lines = summary.lines_written, "Run complete");
        Ok(summary)
    }

    fn execute(&self, form: usize, ledger: &Ledger) -> Result<LineSet, TaxError> {
        let module = &self.modules[form];
        let span = debug_span!("form", form = %module.node().id());
        let _guard = span.enter();

        let view = LedgerView::new(module.node(), module.required_inputs(), ledger, self.config, self.reasoner);
        let set = module.process(&view)?;
        debug!(lines = set.len(), "Form processed");
        Ok(set)
    }

    /// Re-checks the set against the node's declarations, then writes all of
    /// it or none of it.
    fn commit(&self, form: usize, set: LineSet, ledger: &mut Ledger) -> Result<usize, TaxError> {
        let node = self.modules[form].node();
        let violation = |key: &LineKey, violation| TaxError::ContractViolation {
            form: node.id().clone(),
            key: key.clone(),
            violation,
        };

        for (key, value) in set.lines() {
            let spec = match node.output(key) {
                Some(spec) if set.form() == node.id() => spec,
                _ => return Err(violation(key, Violation::UndeclaredWrite)),
            };
            let provenance = value.provenance();
            if spec.is_rule_governed() && provenance.derivation() != Derivation::RuleComputed {
                return Err(violation(key, Violation::RuleGoverned));
            }
            if spec.formula.is_some() && provenance.formula() != spec.formula.as_ref() {
                return Err(violation(key, Violation::FormulaMismatch));
            }
        }
        if let Some(missing) = node.produced_keys().find(|k| !set.lines().iter().any(|(key, _)| key == *k)) {
            return Err(violation(missing, Violation::MissingOutput));
        }
        if let Some((key, _)) = set.lines().iter().find(|(key, _)| ledger.contains(key)) {
            return Err(TaxError::DuplicateWrite { key: key.clone(), producer: node.id().clone() });
        }

        let written = set.len();
        for (key, value) in set.into_lines() {
            ledger.put(key, value)?;
        }
        Ok(written)
    }
}
