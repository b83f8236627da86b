//! Defines `FormNode`, the static declaration of one form module: which lines
//! it reads, which lines it writes and how each written line is governed.

use crate::rules::{Composite, Formula, Rule};
use crate::store::{FormId, LineKey};
use std::collections::BTreeSet;

/// One declared output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpec {
    pub key: LineKey,
    /// `None` marks a free line whose value only external reasoning can supply.
    pub formula: Option<Formula>,
}

impl LineSpec {
    /// Rule-governed lines may only be written by evaluating their rule.
    pub fn is_rule_governed(&self) -> bool { self.formula.as_ref().is_some_and(Formula::is_rule) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormNode {
    id: FormId,
    requires: BTreeSet<LineKey>,
    produces: Vec<LineSpec>,
    upstream: Vec<FormId>,
}

impl FormNode {
    pub fn new(id: FormId) -> Self {
        Self { id, requires: BTreeSet::new(), produces: Vec::new(), upstream: Vec::new() }
    }

    /// Lines read directly, beyond those named in formulas.
    pub fn requires(mut self, keys: impl IntoIterator<Item = LineKey>) -> Self {
        self.requires.extend(keys);
        self
    }

    /// Declares an ordering edge from `upstream` even when no line is shared.
    pub fn after(mut self, upstream: FormId) -> Self {
        self.upstream.push(upstream);
        self
    }

    /// A free line, supplied by reasoning.
    pub fn produces(mut self, key: LineKey) -> Self {
        self.produces.push(LineSpec { key, formula: None });
        self
    }

    pub fn composite(mut self, key: LineKey, composite: Composite) -> Self {
        self.produces.push(LineSpec { key, formula: Some(Formula::Composite(composite)) });
        self
    }

    pub fn rule(mut self, key: LineKey, rule: Rule, inputs: impl IntoIterator<Item = LineKey>) -> Self {
        self.produces.push(LineSpec { key, formula: Some(Formula::rule(rule, inputs)) });
        self
    }

    pub fn id(&self) -> &FormId { &self.id }
    pub fn outputs(&self) -> &[LineSpec] { &self.produces }
    pub fn upstream(&self) -> &[FormId] { &self.upstream }

    pub fn output(&self, key: &LineKey) -> Option<&LineSpec> { self.produces.iter().find(|s| &s.key == key) }

    pub fn produced_keys(&self) -> impl Iterator<Item = &LineKey> + '_ { self.produces.iter().map(|s| &s.key) }

    /// Explicit requirements plus every formula input, minus the node's own outputs.
    pub fn required_inputs(&self) -> BTreeSet<LineKey> {
        let own: BTreeSet<&LineKey> = self.produced_keys().collect();
        self.requires
            .iter()
            .chain(self.produces.iter().filter_map(|s| s.formula.as_ref()).flat_map(|f| f.inputs()))
            .filter(|k| !own.contains(k))
            .cloned()
            .collect()
    }
}
