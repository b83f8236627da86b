//! Compiles a set of FormNodes into a staged execution schedule.
//! All structural errors surface here, before any form executes.

use super::node::FormNode;
use crate::analysis::topology::{self, WeightedEdge};
use crate::error::TaxError;
use crate::store::{FormId, LineKey};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<FormNode>,
    raw_inputs: BTreeSet<LineKey>,
}

impl DependencyGraph {
    pub fn new() -> Self { Self::default() }

    /// Nodes keep their insertion index; it breaks ties in the schedule.
    pub fn add_node(&mut self, node: FormNode) { self.nodes.push(node); }

    /// Declares a line seeded from taxpayer input before the run starts.
    pub fn add_raw_input(&mut self, key: LineKey) { self.raw_inputs.insert(key); }

    pub fn add_raw_inputs(&mut self, keys: impl IntoIterator<Item = LineKey>) { self.raw_inputs.extend(keys); }

    pub fn nodes(&self) -> &[FormNode] { &self.nodes }
    pub fn raw_inputs(&self) -> &BTreeSet<LineKey> { &self.raw_inputs }

    pub fn compile(&self) -> Result<Schedule, TaxError> {
        let ids: Vec<FormId> = self.nodes.iter().map(|n| n.id().clone()).collect();
        let by_id = self.index_forms()?;
        let producers = self.index_producers()?;

        // Edge (from, to) -> lines carried.
        let mut edges: BTreeMap<(usize, usize), Vec<LineKey>> = BTreeMap::new();
        for (to, node) in self.nodes.iter().enumerate() {
            for key in node.required_inputs() {
                match producers.get(&key) {
                    Some(Producer::Form(from)) => edges.entry((*from, to)).or_default().push(key),
                    Some(Producer::Input) => {}
                    None => return Err(TaxError::UnresolvedDependency { form: node.id().clone(), key }),
                }
            }
            for upstream in node.upstream() {
                let from = *by_id.get(upstream).ok_or_else(|| TaxError::UnknownUpstream {
                    form: node.id().clone(),
                    upstream: upstream.clone(),
                })?;
                edges.entry((from, to)).or_default();
            }
        }

        let weighted: Vec<WeightedEdge> = edges.iter().map(|(&(from, to), lines)| (from, to, lines.len())).collect();
        let stages = layered_kahn(ids.len(), &weighted);
        let scheduled: usize = stages.iter().map(Vec::len).sum();
        if scheduled < ids.len() {
            let forms = topology::cycles(&ids, &weighted)
                .into_iter()
                .flatten()
                .map(|i| ids[i].clone())
                .collect();
            return Err(TaxError::Cycle { forms });
        }

        tracing::info!(forms = ids.len(), stages = stages.len(), edges = weighted.len(), "Compiled dependency graph");
        Ok(Schedule { ids, stages, edges: weighted })
    }

    fn index_forms(&self) -> Result<HashMap<FormId, usize>, TaxError> {
        let mut by_id = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            if node.id() == &FormId::INPUT || by_id.insert(node.id().clone(), i).is_some() {
                return Err(TaxError::DuplicateForm { form: node.id().clone() });
            }
        }
        Ok(by_id)
    }

    /// One producer per key: the static guarantee that lets stage-mates write
    /// without coordination.
    fn index_producers(&self) -> Result<HashMap<LineKey, Producer>, TaxError> {
        let mut producers: HashMap<LineKey, Producer> =
            self.raw_inputs.iter().map(|k| (k.clone(), Producer::Input)).collect();

        for (i, node) in self.nodes.iter().enumerate() {
            for spec in node.outputs() {
                if let Some(formula) = &spec.formula {
                    formula.check_arity(&spec.key)?;
                }
                if let Some(first) = producers.insert(spec.key.clone(), Producer::Form(i)) {
                    let first = match first {
                        Producer::Input => FormId::INPUT,
                        Producer::Form(j) => self.nodes[j].id().clone(),
                    };
                    return Err(TaxError::DuplicateProducer {
                        key: spec.key.clone(),
                        first,
                        second: node.id().clone(),
                    });
                }
            }
        }
        Ok(producers)
    }
}

#[derive(Debug, Clone, Copy)]
enum Producer {
    Input,
    Form(usize),
}

/// Kahn's algorithm, one layer at a time. Each layer is sorted by declaration
/// index so the result does not depend on hash or edge order.
fn layered_kahn(count: usize, edges: &[WeightedEdge]) -> Vec<Vec<usize>> {
    let mut in_degree = vec![0usize; count];
    let mut children = vec![Vec::new(); count];
    for &(from, to, _) in edges {
        in_degree[to] += 1;
        children[from].push(to);
    }

    let mut stages = Vec::new();
    let mut layer: Vec<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    while !layer.is_empty() {
        let mut next = Vec::new();
        for &node in &layer {
            for &child in &children[node] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    next.push(child);
                }
            }
        }
        next.sort_unstable();
        stages.push(layer);
        layer = next;
    }
    stages
}

/// The compiled, immutable execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    ids: Vec<FormId>,
    stages: Vec<Vec<usize>>,
    edges: Vec<WeightedEdge>,
}

impl Schedule {
    /// Stages as indices into the declared node list.
    pub fn stages(&self) -> &[Vec<usize>] { &self.stages }

    pub fn stage_ids(&self) -> Vec<Vec<FormId>> {
        self.stages.iter().map(|stage| stage.iter().map(|&i| self.ids[i].clone()).collect()).collect()
    }

    pub fn form_id(&self, index: usize) -> &FormId { &self.ids[index] }

    /// Number of scheduled forms.
    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// `(upstream, downstream)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&FormId, &FormId)> + '_ {
        self.edges.iter().map(|&(from, to, _)| (&self.ids[from], &self.ids[to]))
    }

    pub fn to_dot(&self) -> String { topology::to_dot(&self.ids, &self.edges) }
}
