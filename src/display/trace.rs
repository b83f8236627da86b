use crate::compute::LedgerSnapshot;
use crate::store::{Derivation, LineKey};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the derivation tree of `target`: each line with its value and
/// formula, then the lines that formula read. A line reached a second time
/// is printed as a reference to the level where it first appeared.
pub fn format_trace(snapshot: &LedgerSnapshot, target: &LineKey) -> String {
    let mut tracer = Tracer { snapshot, visited_at_level: HashMap::new(), output: String::new() };

    if snapshot.entry(target).is_some() {
        let _ = writeln!(tracer.output, "AUDIT TRACE for line '{}':", target);
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_line(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: line '{}' is not in the ledger", target);
    }
    tracer.output
}

struct Tracer<'a> {
    snapshot: &'a LedgerSnapshot,
    visited_at_level: HashMap<LineKey, usize>,
    output: String,
}

impl Tracer<'_> {
    fn trace_line(&mut self, key: &LineKey, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(key) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(key.clone(), level);

        let Some(entry) = self.snapshot.entry(key) else {
            let _ = writeln!(self.output, "{}[L{}] {} [?] (missing)", prefix, level, key);
            return;
        };
        let header = format!("[L{}] {} [{}]", level, key, entry.value.value());
        let provenance = entry.value.provenance();

        match (provenance.derivation(), provenance.formula()) {
            (Derivation::RawInput, _) => {
                let _ = writeln!(self.output, "{}{} -> Input", prefix, header);
            }
            (derivation, Some(formula)) => {
                let how = if derivation == Derivation::AgentDerived { "reasoned" } else { "rule" };
                let _ = writeln!(self.output, "{}{} = {}  ({}, {})", prefix, header, formula, provenance.producer(), how);
                let inputs: Vec<LineKey> = formula.inputs().cloned().collect();
                self.recurse_inputs(prefix, &inputs, level);
            }
            (_, None) => {
                let _ = writeln!(self.output, "{}{} [REASONED by {}]", prefix, header, provenance.producer());
            }
        }
    }

    fn recurse_inputs(&mut self, prefix: &str, inputs: &[LineKey], level: usize) {
        let stem = prefix.replace("`--", "   ").replace("|--", "|  ");
        for (i, input) in inputs.iter().enumerate() {
            let connector = if i == inputs.len() - 1 { "`--" } else { "|--" };
            self.trace_line(input, level + 1, &format!("{}{}", stem, connector));
        }
    }
}
