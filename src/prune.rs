//! # Prune & Filter Engine
//!
//! Whole-graph modifications, run by [`apply_prune`] in a fixed order:
//!
//! 1. set-root
//! 2. remove-disconnected
//! 3. depth
//! 4. min-weight / max-weight
//! 5. white-only / black-only
//! 6. keep-best, then keep-worst
//! 7. clear-learning
//! 8. uniform
//! 9. scale-weights
//!
//! Only step 2 removes nodes. Every other step works on edges and may leave
//! nodes without outgoing moves; those stay until reachability is trimmed.
//! The root is never removed by any step.

use hashbrown::HashSet;
use openbook_rules::{RulesProvider, Side};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PruneConfig;
use crate::model::{BookGraph, Edge, NodeId, Weight};
use crate::Result;

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PruneStep {
    SetRoot,
    RemoveDisconnected,
    Depth,
    WeightBounds,
    SideOnly,
    KeepBest,
    KeepWorst,
    ClearLearning,
    Uniform,
    ScaleWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: PruneStep,
    pub nodes_removed: usize,
    pub edges_removed: usize,
}

/// The steps that ran, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub steps: Vec<StepReport>,
}

impl PruneReport {
    fn record(&mut self, step: PruneStep, nodes_removed: usize, edges_removed: usize) {
        debug!(?step, nodes_removed, edges_removed, "prune step");
        self.steps.push(StepReport {
            step,
            nodes_removed,
            edges_removed,
        });
    }

    pub fn nodes_removed(&self) -> usize {
        self.steps.iter().map(|s| s.nodes_removed).sum()
    }

    pub fn edges_removed(&self) -> usize {
        self.steps.iter().map(|s| s.edges_removed).sum()
    }

    pub fn ran(&self, step: PruneStep) -> bool {
        self.steps.iter().any(|s| s.step == step)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Apply every step enabled in `config`, in the order listed in the module docs.
pub fn apply_prune(
    graph: &mut BookGraph,
    config: &PruneConfig,
    rules: &dyn RulesProvider,
) -> Result<PruneReport> {
    let mut report = PruneReport::default();

    if let Some(fen) = &config.set_root {
        set_root(graph, fen, rules)?;
        report.record(PruneStep::SetRoot, 0, 0);
    }
    if config.remove_disconnected {
        let (nodes, edges) = remove_disconnected(graph);
        report.record(PruneStep::RemoveDisconnected, nodes, edges);
    }
    if let Some(depth) = config.depth {
        report.record(PruneStep::Depth, 0, truncate_depth(graph, depth));
    }
    if config.min_weight.is_some() || config.max_weight.is_some() {
        let dropped = filter_weight(graph, config.min_weight, config.max_weight);
        report.record(PruneStep::WeightBounds, 0, dropped);
    }
    let side = match (config.white_only, config.black_only) {
        (true, false) => Some(Side::White),
        (false, true) => Some(Side::Black),
        _ => None,
    };
    if let Some(side) = side {
        report.record(PruneStep::SideOnly, 0, keep_side(graph, side, rules));
    }
    if let Some(n) = config.keep_best {
        report.record(PruneStep::KeepBest, 0, keep_best(graph, n));
    }
    if let Some(n) = config.keep_worst {
        report.record(PruneStep::KeepWorst, 0, keep_worst(graph, n));
    }
    if config.clear_learning {
        clear_learning(graph);
        report.record(PruneStep::ClearLearning, 0, 0);
    }
    if config.uniform {
        uniform(graph);
        report.record(PruneStep::Uniform, 0, 0);
    }
    if let Some(factor) = config.scale_weights {
        scale_weights(graph, factor);
        report.record(PruneStep::ScaleWeights, 0, 0);
    }

    Ok(report)
}

// ============================================================================
// Steps
// ============================================================================

/// Point the root at the position given by `fen`, creating an isolated node
/// for it if the book does not contain it.
pub fn set_root(graph: &mut BookGraph, fen: &str, rules: &dyn RulesProvider) -> Result<()> {
    let position = rules.parse_fen(fen)?;
    let id = graph.get_or_create_node(rules.identity(&position), position);
    graph.set_root(id)
}

/// Delete every node not reachable from the root.
/// Returns (nodes removed, edges removed).
pub fn remove_disconnected(graph: &mut BookGraph) -> (usize, usize) {
    let reachable = graph.reachable_from(graph.root());
    let unreachable: HashSet<NodeId> = graph
        .nodes()
        .map(|n| n.id)
        .filter(|id| !reachable.contains(id))
        .collect();
    let edges_before = graph.edge_count();
    let nodes = graph.remove_nodes(&unreachable);
    (nodes, edges_before - graph.edge_count())
}

/// Keep an edge only if its source lies fewer than `depth` plies from the
/// root along a shortest path. Edges of unreachable nodes are dropped.
pub fn truncate_depth(graph: &mut BookGraph, depth: usize) -> usize {
    let distances = graph.distances_from(graph.root());
    graph.retain_edges(|source, _, _| distances.get(&source).is_some_and(|&d| d < depth))
}

pub fn filter_weight(graph: &mut BookGraph, min: Option<Weight>, max: Option<Weight>) -> usize {
    graph.retain_edges(|_, _, edge| {
        min.is_none_or(|m| edge.weight >= m) && max.is_none_or(|m| edge.weight <= m)
    })
}

/// Keep only moves made by `side`.
pub fn keep_side(graph: &mut BookGraph, side: Side, rules: &dyn RulesProvider) -> usize {
    graph.retain_edges(|_, position, _| rules.side_to_move(position) == side)
}

/// Per node, keep the `n` heaviest edges. Ties go to the lower move token.
pub fn keep_best(graph: &mut BookGraph, n: usize) -> usize {
    keep_ranked(graph, n, |a, b| b.weight.cmp(&a.weight).then(a.mv.cmp(&b.mv)))
}

/// Per node, keep the `n` lightest edges. Ties go to the lower move token.
pub fn keep_worst(graph: &mut BookGraph, n: usize) -> usize {
    keep_ranked(graph, n, |a, b| a.weight.cmp(&b.weight).then(a.mv.cmp(&b.mv)))
}

fn keep_ranked<F>(graph: &mut BookGraph, n: usize, order: F) -> usize
where
    F: Fn(&Edge, &Edge) -> std::cmp::Ordering,
{
    let mut dropped = 0;
    graph.map_edge_lists(|edges| {
        if edges.len() > n {
            edges.sort_by(&order);
            dropped += edges.len() - n;
            edges.truncate(n);
        }
    });
    dropped
}

pub fn clear_learning(graph: &mut BookGraph) {
    graph.for_each_edge_mut(|edge| edge.learn = 0);
}

/// Set every weight to 1.
pub fn uniform(graph: &mut BookGraph) {
    graph.for_each_edge_mut(|edge| edge.weight = 1);
}

/// Multiply every weight by `factor`, rounding half away from zero.
/// Zero-weight edges are kept.
pub fn scale_weights(graph: &mut BookGraph, factor: f64) {
    graph.for_each_edge_mut(|edge| edge.weight = scale(edge.weight, factor));
}

fn scale(weight: Weight, factor: f64) -> Weight {
    // float → int casts saturate
    (weight as f64 * factor).round() as Weight
}

// ============================================================================
// Tests
// ============================================================================
