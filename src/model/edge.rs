//! Edge (candidate move) in the book graph.

use openbook_rules::MoveToken;

use super::NodeId;

/// Accumulated move score.
pub type Weight = u64;

/// Auxiliary learning score, carried through but never computed here.
pub type Learn = u32;

/// A candidate move from one position to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub mv: MoveToken,
    pub target: NodeId,
    pub weight: Weight,
    pub learn: Learn,
}

impl Edge {
    pub fn new(mv: MoveToken, target: NodeId) -> Self {
        Self {
            mv,
            target,
            weight: 0,
            learn: 0,
        }
    }

    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_learn(mut self, learn: Learn) -> Self {
        self.learn = learn;
        self
    }

    /// Is this a move back into its own source position?
    pub fn is_self_loop(&self, source: NodeId) -> bool {
        self.target == source
    }
}
