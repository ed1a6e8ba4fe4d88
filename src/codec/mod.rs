//! # Codec Layer
//!
//! Every format describes the same [`BookGraph`] and converts losslessly:
//! `decode(encode(g))` has the same root, the same positions, and the same
//! edges with the same weights and learning values.
//!
//! | Format | Encoding | Lookup |
//! |--------|----------|--------|
//! | [`BookFormat::Binary`] | fixed-width big-endian records sorted by key | binary search via [`binary::BinaryBookView`] |
//! | [`BookFormat::Tree`] | indented move tree, one branch per line | linear |
//! | [`BookFormat::TreeBlob`] | the same tree, one line per block | linear |
//! | [`BookFormat::Json`] | self-describing `serde_json` document | linear |
//!
//! Decoders never build a partial graph. Dangling targets, duplicate moves on
//! one node, duplicate positions and moves that do not lead where the record
//! says all fail with [`Error::Decode`](crate::Error::Decode), naming the input.

pub mod binary;
pub mod json;
pub mod tree;

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use hashbrown::HashMap;
use openbook_rules::{MoveToken, Position, PositionKey, RulesProvider};
use serde::{Deserialize, Serialize};

use crate::model::{BookGraph, Edge, Learn, NodeId, Weight};
use crate::{Error, Result};

// ============================================================================
// Formats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookFormat {
    Binary,
    Tree,
    TreeBlob,
    Json,
}

impl BookFormat {
    pub const ALL: [BookFormat; 4] = [
        BookFormat::Binary,
        BookFormat::Tree,
        BookFormat::TreeBlob,
        BookFormat::Json,
    ];

    /// Infer a format from a file name's extension.
    pub fn from_path(path: &str) -> Option<BookFormat> {
        let (_, ext) = path.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "bin" | "obk" => Some(BookFormat::Binary),
            "txt" | "tree" => Some(BookFormat::Tree),
            "blob" => Some(BookFormat::TreeBlob),
            "json" => Some(BookFormat::Json),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BookFormat::Binary => "binary",
            BookFormat::Tree => "tree",
            BookFormat::TreeBlob => "tree-blob",
            BookFormat::Json => "json",
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BookFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(BookFormat::Binary),
            "tree" | "txt" => Ok(BookFormat::Tree),
            "tree-blob" | "blob" => Ok(BookFormat::TreeBlob),
            "json" => Ok(BookFormat::Json),
            other => Err(Error::Config(format!("unknown book format '{other}'"))),
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Encode `graph` into `out`.
///
/// The whole encoding is produced before anything is written, so an encode
/// error never leaves partial output behind.
pub fn encode(
    graph: &BookGraph,
    format: BookFormat,
    out: &mut dyn Write,
    rules: &dyn RulesProvider,
) -> Result<()> {
    let bytes = encode_to_vec(graph, format, rules)?;
    out.write_all(&bytes)?;
    out.flush()?;
    Ok(())
}

pub fn encode_to_vec(graph: &BookGraph, format: BookFormat, rules: &dyn RulesProvider) -> Result<Vec<u8>> {
    match format {
        BookFormat::Binary => binary::encode(graph, rules),
        BookFormat::Tree => tree::encode_text(graph, rules).map(String::into_bytes),
        BookFormat::TreeBlob => tree::encode_blob(graph, rules).map(String::into_bytes),
        BookFormat::Json => json::encode(graph, rules).map(String::into_bytes),
    }
}

/// Read all of `reader` and decode it. `input` names the source in errors.
pub fn decode(
    format: BookFormat,
    reader: &mut dyn Read,
    input: &str,
    rules: &dyn RulesProvider,
) -> Result<BookGraph> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::decode(input, format!("read failed: {e}")))?;
    decode_bytes(format, &bytes, input, rules)
}

pub fn decode_bytes(
    format: BookFormat,
    bytes: &[u8],
    input: &str,
    rules: &dyn RulesProvider,
) -> Result<BookGraph> {
    match format {
        BookFormat::Binary => binary::decode(bytes, input, rules),
        BookFormat::Json => json::decode(bytes, input, rules),
        BookFormat::Tree | BookFormat::TreeBlob => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| Error::decode(input, format!("not valid UTF-8: {e}")))?;
            if format == BookFormat::Tree {
                tree::decode_text(text, input, rules)
            } else {
                tree::decode_blob(text, input, rules)
            }
        }
    }
}

// ============================================================================
// Index-addressed books
// ============================================================================

/// Nodes in key order with a dense index per node. The binary and JSON
/// formats address nodes by this index.
pub(crate) struct NodeIndex {
    pub ids: Vec<NodeId>,
    pub index: HashMap<NodeId, usize>,
}

impl NodeIndex {
    pub fn new(graph: &BookGraph) -> Self {
        let ids = graph.ids_by_key();
        let index = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        Self { ids, index }
    }

    pub fn of(&self, id: NodeId) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }
}

/// One decoded node before graph assembly.
pub(crate) struct IndexedNode {
    pub position: Position,
    /// Key stored in the input, checked against the position's identity.
    pub stored_key: Option<PositionKey>,
    pub edges: Vec<IndexedEdge>,
}

pub(crate) struct IndexedEdge {
    pub mv: MoveToken,
    pub target: usize,
    pub weight: Weight,
    pub learn: Learn,
}

/// Build a graph from index-addressed nodes, validating every structural
/// invariant on the way.
pub(crate) fn assemble(
    nodes: Vec<IndexedNode>,
    root: usize,
    input: &str,
    rules: &dyn RulesProvider,
) -> Result<BookGraph> {
    if root >= nodes.len() {
        return Err(Error::decode(
            input,
            format!("root index {root} out of range ({} nodes)", nodes.len()),
        ));
    }

    let mut keys = Vec::with_capacity(nodes.len());
    let mut seen = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let key = rules.identity(&node.position);
        if let Some(stored) = node.stored_key {
            if stored != key {
                return Err(Error::decode(
                    input,
                    format!("node {i}: stored key {stored} does not match its position ({key})"),
                ));
            }
        }
        if let Some(first) = seen.insert(key, i) {
            return Err(Error::decode(
                input,
                format!("nodes {first} and {i} hold the same position"),
            ));
        }
        keys.push(key);
    }

    let mut graph = BookGraph::new(keys[root], nodes[root].position.clone());
    let ids: Vec<NodeId> = nodes
        .iter()
        .zip(&keys)
        .map(|(node, &key)| graph.get_or_create_node(key, node.position.clone()))
        .collect();

    for (i, node) in nodes.iter().enumerate() {
        for edge in &node.edges {
            let Some(&target_key) = keys.get(edge.target) else {
                return Err(Error::decode(
                    input,
                    format!("node {i}: move {} points at missing node {}", edge.mv, edge.target),
                ));
            };
            let reached = rules
                .apply_move(&node.position, edge.mv)
                .map_err(|e| Error::decode(input, format!("node {i}: {e}")))?;
            if rules.identity(&reached) != target_key {
                return Err(Error::decode(
                    input,
                    format!("node {i}: move {} does not lead to node {}", edge.mv, edge.target),
                ));
            }
            let inserted = graph.insert_edge(
                ids[i],
                Edge::new(edge.mv, ids[edge.target])
                    .with_weight(edge.weight)
                    .with_learn(edge.learn),
            )?;
            if !inserted {
                return Err(Error::decode(
                    input,
                    format!("node {i}: duplicate move {}", edge.mv),
                ));
            }
        }
    }
    Ok(graph)
}

// ============================================================================
// Tests
// ============================================================================
