//! Node in the book graph.

use openbook_rules::{MoveToken, Position, PositionKey};
use smallvec::SmallVec;

use super::Edge;

/// Arena slot identifier. Stable for the lifetime of a graph, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outgoing edges of a node. Most book positions carry a handful of moves.
pub type EdgeList = SmallVec<[Edge; 4]>;

/// One distinct position in the book.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub key: PositionKey,
    pub position: Position,
    pub(crate) edges: EdgeList,
}

impl Node {
    pub fn new(id: NodeId, key: PositionKey, position: Position) -> Self {
        Self {
            id,
            key,
            position,
            edges: EdgeList::new(),
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, mv: MoveToken) -> Option<&Edge> {
        self.edges.iter().find(|e| e.mv == mv)
    }

    pub(crate) fn edge_mut(&mut self, mv: MoveToken) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.mv == mv)
    }

    pub fn out_degree(&self) -> usize {
        self.edges.len()
    }

    /// Edges ordered by weight descending, then move token ascending.
    pub fn edges_by_weight(&self) -> Vec<Edge> {
        let mut edges = self.edges.to_vec();
        edges.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.mv.cmp(&b.mv)));
        edges
    }
}
