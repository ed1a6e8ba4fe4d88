//! # Merge Engine
//!
//! Folds later books into a working book by position identity.
//!
//! The working graph is the first graph given. Every later graph is merged
//! node by node: positions already present are reused, so transpositions
//! across inputs unify even when the inputs are rooted differently. For an
//! edge that already exists, the policy decides what happens:
//!
//! | Policy | Weight | Learning |
//! |--------|--------|----------|
//! | `FirstWins` | untouched | untouched |
//! | `CombineEntries` | later weight added | untouched |
//!
//! Edges that are new to the working graph are copied as-is, learning
//! value included. The working root never changes.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MergeConfig;
use crate::model::{BookGraph, Edge};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Existing edges are left exactly as they are.
    #[default]
    FirstWins,
    /// Existing edges accumulate later weights.
    CombineEntries,
}

impl From<&MergeConfig> for MergePolicy {
    fn from(config: &MergeConfig) -> Self {
        if config.combine_entries {
            MergePolicy::CombineEntries
        } else {
            MergePolicy::FirstWins
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub nodes_added: usize,
    pub edges_added: usize,
    /// Existing edges that received a later weight.
    pub edges_combined: usize,
    /// Existing edges left untouched.
    pub edges_ignored: usize,
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes_added += rhs.nodes_added;
        self.edges_added += rhs.edges_added;
        self.edges_combined += rhs.edges_combined;
        self.edges_ignored += rhs.edges_ignored;
    }
}

/// Merge `other` into `working`.
pub fn merge_into(working: &mut BookGraph, other: &BookGraph, policy: MergePolicy) -> Result<MergeStats> {
    let mut stats = MergeStats::default();
    let order = other.ids_by_key();

    // Nodes first, so every edge below has a live target.
    for &id in &order {
        let node = other
            .node(id)
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        if working.id_of(node.key).is_none() {
            working.get_or_create_node(node.key, node.position.clone());
            stats.nodes_added += 1;
        }
    }

    for &id in &order {
        let node = other
            .node(id)
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let source = working
            .id_of(node.key)
            .ok_or_else(|| Error::NotFound(format!("Position {}", node.key)))?;

        for edge in node.edges() {
            if working.contains_edge(source, edge.mv) {
                match policy {
                    MergePolicy::CombineEntries => {
                        working.add_weight(source, edge.mv, edge.weight)?;
                        stats.edges_combined += 1;
                    }
                    MergePolicy::FirstWins => stats.edges_ignored += 1,
                }
                continue;
            }
            let target_key = other
                .node(edge.target)
                .map(|n| n.key)
                .ok_or_else(|| Error::NotFound(format!("Node {}", edge.target)))?;
            let target = working
                .id_of(target_key)
                .ok_or_else(|| Error::NotFound(format!("Position {target_key}")))?;
            working.insert_edge(
                source,
                Edge::new(edge.mv, target)
                    .with_weight(edge.weight)
                    .with_learn(edge.learn),
            )?;
            stats.edges_added += 1;
        }
    }

    debug!(
        nodes_added = stats.nodes_added,
        edges_added = stats.edges_added,
        edges_combined = stats.edges_combined,
        edges_ignored = stats.edges_ignored,
        ?policy,
        "merged book"
    );
    Ok(stats)
}

/// Merge an ordered sequence of graphs. The first becomes the working graph.
/// Returns `None` when `graphs` is empty.
pub fn merge_all<I>(graphs: I, policy: MergePolicy) -> Result<Option<(BookGraph, MergeStats)>>
where
    I: IntoIterator<Item = BookGraph>,
{
    let mut graphs = graphs.into_iter();
    let Some(mut working) = graphs.next() else {
        return Ok(None);
    };
    let mut stats = MergeStats::default();
    for other in graphs {
        stats += merge_into(&mut working, &other, policy)?;
    }
    Ok(Some((working, stats)))
}

// ============================================================================
// Tests
// ============================================================================
