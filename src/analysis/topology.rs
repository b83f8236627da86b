//! petgraph views of a compiled dependency graph: cycle diagnostics and a
//! Graphviz rendering.
use crate::store::FormId;
use petgraph::algo::tarjan_scc;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

/// A `from -> to` edge between form indices, weighted by the number of lines
/// it carries (0 for a declared ordering edge).
pub(crate) type WeightedEdge = (usize, usize, usize);

fn build(ids: &[FormId], edges: &[WeightedEdge]) -> DiGraph<FormId, usize> {
    let mut graph = DiGraph::with_capacity(ids.len(), edges.len());
    for id in ids {
        graph.add_node(id.clone());
    }
    for &(from, to, lines) in edges {
        graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), lines);
    }
    graph
}

/// Every strongly connected component that forms a cycle, as form indices.
///
/// Members are in declaration order and components are ordered by their
/// first member, so diagnostics are stable across runs.
pub(crate) fn cycles(ids: &[FormId], edges: &[WeightedEdge]) -> Vec<Vec<usize>> {
    let graph = build(ids, edges);
    let mut components: Vec<Vec<usize>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<usize> = scc.into_iter().map(NodeIndex::index).collect();
            members.sort_unstable();
            members
        })
        .collect();
    components.sort_unstable();
    components
}

pub(crate) fn to_dot(ids: &[FormId], edges: &[WeightedEdge]) -> String {
    let graph = build(ids, edges);
    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}
