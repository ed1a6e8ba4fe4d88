//! The book graph: an arena of position nodes keyed by position identity.
//!
//! Nodes live in a `HashMap<NodeId, Node>` with a secondary index from
//! `PositionKey` to `NodeId`. That index is the transposition-merge point:
//! asking for a node by position always returns the existing node if one
//! exists, no matter which move order reached it.
//!
//! The graph is a general directed graph. Self-loops and cycles are legal and
//! every traversal here is visited-set based.
//!
//! ## Invariants
//!
//! - The root node is always present and can never be removed.
//! - At most one edge per (node, move).
//! - Every edge target is a live node. Removing a node removes every edge
//!   pointing at it in the same call.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::{HashMap, HashSet};
use openbook_rules::{MoveToken, Position, PositionKey, RulesProvider};

use super::{Edge, EdgeList, Learn, Node, NodeId, Weight};
use crate::{Error, Result};

// ============================================================================
// BookGraph
// ============================================================================

/// In-memory opening book.
#[derive(Debug, Clone)]
pub struct BookGraph {
    nodes: HashMap<NodeId, Node>,
    /// position key → node (the transposition index)
    index: HashMap<PositionKey, NodeId>,
    root: NodeId,
    next_id: u32,
}

impl BookGraph {
    /// Create a graph holding only a root node.
    pub fn new(root_key: PositionKey, root_position: Position) -> Self {
        let mut graph = Self {
            nodes: HashMap::new(),
            index: HashMap::new(),
            root: NodeId(0),
            next_id: 0,
        };
        graph.root = graph.get_or_create_node(root_key, root_position);
        graph
    }

    /// Empty book rooted at the standard starting position.
    pub fn from_start(rules: &dyn RulesProvider) -> Self {
        Self::rooted_at(rules, rules.start_position())
    }

    /// Empty book rooted at `position`.
    pub fn rooted_at(rules: &dyn RulesProvider, position: Position) -> Self {
        Self::new(rules.identity(&position), position)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[&self.root]
    }

    /// Move the root pointer. Graph membership is otherwise unchanged.
    pub fn set_root(&mut self, id: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&id) {
            return Err(Error::NotFound(format!("Node {id}")));
        }
        self.root = id;
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_by_key(&self, key: PositionKey) -> Option<&Node> {
        self.index.get(&key).and_then(|id| self.nodes.get(id))
    }

    pub fn id_of(&self, key: PositionKey) -> Option<NodeId> {
        self.index.get(&key).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All nodes, in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node ids ordered by position key. Used wherever output must be stable.
    pub fn ids_by_key(&self) -> Vec<NodeId> {
        let mut ids: Vec<(PositionKey, NodeId)> =
            self.nodes.values().map(|n| (n.key, n.id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.edges.len()).sum()
    }

    pub fn edge(&self, from: NodeId, mv: MoveToken) -> Option<&Edge> {
        self.nodes.get(&from).and_then(|n| n.edge(mv))
    }

    pub fn contains_edge(&self, from: NodeId, mv: MoveToken) -> bool {
        self.edge(from, mv).is_some()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Return the node for `key`, creating an empty one if none exists.
    pub fn get_or_create_node(&mut self, key: PositionKey, position: Position) -> NodeId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(id, key, position));
        self.index.insert(key, id);
        id
    }

    /// Return the edge for (`from`, `mv`), creating a zero-weight edge to
    /// `target` if none exists. An existing edge keeps its original target.
    pub fn get_or_create_edge(
        &mut self,
        from: NodeId,
        mv: MoveToken,
        target: NodeId,
    ) -> Result<&mut Edge> {
        if !self.nodes.contains_key(&target) {
            return Err(Error::NotFound(format!("Target node {target}")));
        }
        let node = self
            .nodes
            .get_mut(&from)
            .ok_or_else(|| Error::NotFound(format!("Source node {from}")))?;

        let pos = match node.edges.iter().position(|e| e.mv == mv) {
            Some(pos) => pos,
            None => {
                node.edges.push(Edge::new(mv, target));
                node.edges.len() - 1
            }
        };
        Ok(&mut node.edges[pos])
    }

    /// Insert a fully formed edge. Returns `false` and leaves the graph
    /// untouched if (`from`, `edge.mv`) already exists.
    pub fn insert_edge(&mut self, from: NodeId, edge: Edge) -> Result<bool> {
        if !self.nodes.contains_key(&edge.target) {
            return Err(Error::NotFound(format!("Target node {}", edge.target)));
        }
        let node = self
            .nodes
            .get_mut(&from)
            .ok_or_else(|| Error::NotFound(format!("Source node {from}")))?;
        if node.edge(edge.mv).is_some() {
            return Ok(false);
        }
        node.edges.push(edge);
        Ok(true)
    }

    pub fn add_weight(&mut self, from: NodeId, mv: MoveToken, delta: Weight) -> Result<()> {
        let edge = self.edge_mut(from, mv)?;
        edge.weight = edge.weight.saturating_add(delta);
        Ok(())
    }

    pub fn set_learning(&mut self, from: NodeId, mv: MoveToken, value: Learn) -> Result<()> {
        self.edge_mut(from, mv)?.learn = value;
        Ok(())
    }

    fn edge_mut(&mut self, from: NodeId, mv: MoveToken) -> Result<&mut Edge> {
        self.nodes
            .get_mut(&from)
            .and_then(|n| n.edge_mut(mv))
            .ok_or_else(|| Error::NotFound(format!("Edge {mv} at node {from}")))
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a node and every edge touching it. The root is never removed.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let mut set = HashSet::new();
        set.insert(id);
        self.remove_nodes(&set) == 1
    }

    /// Remove a set of nodes in one pass. Returns the number removed.
    pub fn remove_nodes(&mut self, ids: &HashSet<NodeId>) -> usize {
        let mut removed = HashSet::new();
        for id in ids {
            if *id == self.root {
                continue;
            }
            if let Some(node) = self.nodes.remove(id) {
                self.index.remove(&node.key);
                removed.insert(node.id);
            }
        }
        if !removed.is_empty() {
            for node in self.nodes.values_mut() {
                node.edges.retain(|e| !removed.contains(&e.target));
            }
        }
        removed.len()
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Every node reachable from `start` (including `start`).
    pub fn reachable_from(&self, start: NodeId) -> HashSet<NodeId> {
        self.distances_from(start).into_keys().collect()
    }

    /// Shortest distance in plies from `start` to every reachable node.
    pub fn distances_from(&self, start: NodeId) -> HashMap<NodeId, usize> {
        let mut dist = HashMap::new();
        if !self.nodes.contains_key(&start) {
            return dist;
        }
        let mut queue = VecDeque::new();
        dist.insert(start, 0);
        queue.push_back(start);

        while let Some(id) = queue.pop_front() {
            let d = dist[&id];
            for edge in self.nodes[&id].edges.iter() {
                if !dist.contains_key(&edge.target) {
                    dist.insert(edge.target, d + 1);
                    queue.push_back(edge.target);
                }
            }
        }
        dist
    }

    // ========================================================================
    // Bulk edge mutation
    // ========================================================================

    /// Keep only edges for which `keep(source, source_position, edge)` holds.
    /// Returns the number of edges dropped. Nodes are never removed here.
    pub fn retain_edges<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(NodeId, &Position, &Edge) -> bool,
    {
        let mut dropped = 0;
        for node in self.nodes.values_mut() {
            let (id, position) = (node.id, node.position.clone());
            let before = node.edges.len();
            node.edges.retain(|e| keep(id, &position, e));
            dropped += before - node.edges.len();
        }
        dropped
    }

    /// Rewrite every node's edge list in place.
    pub fn map_edge_lists<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut EdgeList),
    {
        for node in self.nodes.values_mut() {
            f(&mut node.edges);
        }
    }

    pub fn for_each_edge_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Edge),
    {
        for node in self.nodes.values_mut() {
            node.edges.iter_mut().for_each(&mut f);
        }
    }

    // ========================================================================
    // Canonical form
    // ========================================================================

    /// Order-independent canonical form. Two graphs are isomorphic exactly
    /// when their snapshots are equal.
    pub fn snapshot(&self) -> BookSnapshot {
        let mut nodes = BTreeMap::new();
        for node in self.nodes.values() {
            let mut edges: Vec<SnapshotEdge> = node
                .edges
                .iter()
                .map(|e| SnapshotEdge {
                    mv: e.mv,
                    target: self.nodes[&e.target].key,
                    weight: e.weight,
                    learn: e.learn,
                })
                .collect();
            edges.sort_by_key(|e| e.mv);
            nodes.insert(node.key, edges);
        }
        BookSnapshot {
            root: self.root_node().key,
            nodes,
        }
    }
}

/// One edge of a [`BookSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEdge {
    pub mv: MoveToken,
    pub target: PositionKey,
    pub weight: Weight,
    pub learn: Learn,
}

/// Canonical, comparable view of a [`BookGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    pub root: PositionKey,
    pub nodes: BTreeMap<PositionKey, Vec<SnapshotEdge>>,
}

impl BookSnapshot {
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }
}
