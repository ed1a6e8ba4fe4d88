//! Structured interchange format (`serde_json`).
//!
//! ```json
//! {
//!   "format": "openbook",
//!   "version": 1,
//!   "root": 0,
//!   "nodes": [
//!     { "fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
//!       "moves": [ { "move": "e2e4", "weight": 2, "learn": 0, "to": 1 } ] },
//!     { "fen": "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1" }
//!   ]
//! }
//! ```
//!
//! Nodes are written in position-key order and referenced by index. Moves
//! are written as UCI; the decoder also accepts SAN.

use openbook_rules::RulesProvider;
use serde::{Deserialize, Serialize};

use super::{assemble, IndexedEdge, IndexedNode, NodeIndex};
use crate::model::{BookGraph, Learn, Weight};
use crate::{Error, Result};

pub const FORMAT_TAG: &str = "openbook";
pub const VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookDocument {
    pub format: String,
    pub version: u32,
    pub root: usize,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeRecord {
    pub fen: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moves: Vec<MoveRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveRecord {
    #[serde(rename = "move")]
    pub mv: String,
    pub weight: Weight,
    #[serde(default)]
    pub learn: Learn,
    pub to: usize,
}

impl BookDocument {
    pub fn from_graph(graph: &BookGraph, rules: &dyn RulesProvider) -> Result<Self> {
        let index = NodeIndex::new(graph);
        let mut nodes = Vec::with_capacity(index.ids.len());

        for &id in &index.ids {
            let node = graph
                .node(id)
                .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
            let mut edges = node.edges().to_vec();
            edges.sort_by_key(|e| e.mv);
            let moves = edges
                .iter()
                .map(|e| {
                    Ok(MoveRecord {
                        mv: e.mv.to_string(),
                        weight: e.weight,
                        learn: e.learn,
                        to: index.of(e.target)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            nodes.push(NodeRecord {
                fen: rules.to_fen(&node.position),
                moves,
            });
        }

        Ok(Self {
            format: FORMAT_TAG.to_string(),
            version: VERSION,
            root: index.of(graph.root())?,
            nodes,
        })
    }

    pub fn into_graph(self, input: &str, rules: &dyn RulesProvider) -> Result<BookGraph> {
        if self.format != FORMAT_TAG {
            return Err(Error::decode(input, format!("unexpected format tag '{}'", self.format)));
        }
        if self.version != VERSION {
            return Err(Error::decode(input, format!("unsupported version {}", self.version)));
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (i, record) in self.nodes.into_iter().enumerate() {
            let position = rules
                .parse_fen(&record.fen)
                .map_err(|e| Error::decode(input, format!("node {i}: {e}")))?;
            let edges = record
                .moves
                .into_iter()
                .map(|m| {
                    let mv = rules
                        .parse_move(&position, &m.mv)
                        .map_err(|e| Error::decode(input, format!("node {i}: {e}")))?;
                    Ok(IndexedEdge {
                        mv,
                        target: m.to,
                        weight: m.weight,
                        learn: m.learn,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            nodes.push(IndexedNode {
                position,
                stored_key: None,
                edges,
            });
        }
        assemble(nodes, self.root, input, rules)
    }
}

pub fn encode(graph: &BookGraph, rules: &dyn RulesProvider) -> Result<String> {
    let document = BookDocument::from_graph(graph, rules)?;
    let mut text = serde_json::to_string_pretty(&document)
        .map_err(|e| Error::Encode(format!("json: {e}")))?;
    text.push('\n');
    Ok(text)
}

pub fn decode(bytes: &[u8], input: &str, rules: &dyn RulesProvider) -> Result<BookGraph> {
    let document: BookDocument = serde_json::from_slice(bytes)
        .map_err(|e| Error::decode(input, format!("invalid JSON: {e}")))?;
    document.into_graph(input, rules)
}
