//! Binary book format.
//!
//! All integers are big-endian. Records are fixed width so any node can be
//! located by binary search over the node table without decoding the book.
//!
//! ```text
//! header (24 bytes)
//!   magic       [u8; 4]   "OBK1"
//!   version     u16       1
//!   flags       u16       0
//!   node_count  u32
//!   edge_count  u32
//!   root_index  u32       index into the node table
//!   fen_bytes   u32       size of the FEN table
//!
//! node table (node_count × 20 bytes, strictly ascending by key)
//!   key         u64       position identity
//!   first_edge  u32       index into the edge table
//!   edge_count  u16
//!   fen_len     u16
//!   fen_offset  u32       byte offset into the FEN table
//!
//! edge table (edge_count × 16 bytes, contiguous per node, ascending move)
//!   move        u16       packed move token
//!   reserved    u16       0
//!   target      u32       node index
//!   weight      u32
//!   learn       u32
//!
//! FEN table (fen_bytes of UTF-8)
//! ```
//!
//! Weights wider than 32 bits cannot be stored; encoding such a book fails
//! instead of truncating.

use openbook_rules::{MoveToken, PositionKey, RulesProvider};

use super::{assemble, IndexedEdge, IndexedNode, NodeIndex};
use crate::model::BookGraph;
use crate::{Error, Result};

pub const MAGIC: [u8; 4] = *b"OBK1";
pub const VERSION: u16 = 1;

const HEADER_LEN: usize = 24;
const NODE_LEN: usize = 20;
const EDGE_LEN: usize = 16;

// ============================================================================
// Encoding
// ============================================================================

pub fn encode(graph: &BookGraph, rules: &dyn RulesProvider) -> Result<Vec<u8>> {
    let index = NodeIndex::new(graph);
    let node_count = index.ids.len();
    let edge_count = graph.edge_count();

    let mut nodes = Vec::with_capacity(node_count * NODE_LEN);
    let mut edges = Vec::with_capacity(edge_count * EDGE_LEN);
    let mut fens = Vec::new();
    let mut first_edge = 0usize;

    for &id in &index.ids {
        let node = graph
            .node(id)
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let fen = rules.to_fen(&node.position);

        let mut out_edges = node.edges().to_vec();
        out_edges.sort_by_key(|e| e.mv);

        nodes.extend_from_slice(&node.key.0.to_be_bytes());
        nodes.extend_from_slice(&field_u32(first_edge, "edge index")?.to_be_bytes());
        nodes.extend_from_slice(&field_u16(out_edges.len(), "moves per node")?.to_be_bytes());
        nodes.extend_from_slice(&field_u16(fen.len(), "FEN length")?.to_be_bytes());
        nodes.extend_from_slice(&field_u32(fens.len(), "FEN table size")?.to_be_bytes());
        fens.extend_from_slice(fen.as_bytes());

        for edge in &out_edges {
            let weight = u32::try_from(edge.weight).map_err(|_| {
                Error::Encode(format!(
                    "weight {} of move {} at {} exceeds the binary format's 32-bit field",
                    edge.weight, edge.mv, node.key
                ))
            })?;
            edges.extend_from_slice(&edge.mv.raw().to_be_bytes());
            edges.extend_from_slice(&0u16.to_be_bytes());
            edges.extend_from_slice(&field_u32(index.of(edge.target)?, "node index")?.to_be_bytes());
            edges.extend_from_slice(&weight.to_be_bytes());
            edges.extend_from_slice(&edge.learn.to_be_bytes());
        }
        first_edge += out_edges.len();
    }

    let root = index.of(graph.root())?;
    let mut out = Vec::with_capacity(HEADER_LEN + nodes.len() + edges.len() + fens.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&field_u32(node_count, "node count")?.to_be_bytes());
    out.extend_from_slice(&field_u32(edge_count, "edge count")?.to_be_bytes());
    out.extend_from_slice(&field_u32(root, "root index")?.to_be_bytes());
    out.extend_from_slice(&field_u32(fens.len(), "FEN table size")?.to_be_bytes());
    out.extend_from_slice(&nodes);
    out.extend_from_slice(&edges);
    out.extend_from_slice(&fens);
    Ok(out)
}

fn field_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Encode(format!("{what} {value} does not fit in 32 bits")))
}

fn field_u16(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::Encode(format!("{what} {value} does not fit in 16 bits")))
}

// ============================================================================
// Zero-copy view
// ============================================================================

/// A structurally validated binary book, read in place.
///
/// `open` checks the layout (lengths, ordering, index ranges) but not chess
/// legality; [`decode`] adds that on top.
#[derive(Debug, Clone, Copy)]
pub struct BinaryBookView<'a> {
    bytes: &'a [u8],
    node_count: usize,
    edge_count: usize,
    root: usize,
    nodes_at: usize,
    edges_at: usize,
    fens_at: usize,
}

/// One entry of the node table.
#[derive(Debug, Clone, Copy)]
pub struct BinaryNode<'a> {
    view: BinaryBookView<'a>,
    index: usize,
}

/// One entry of the edge table, with its target resolved to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryMove {
    pub mv: MoveToken,
    pub target: PositionKey,
    pub weight: u32,
    pub learn: u32,
}

impl<'a> BinaryBookView<'a> {
    pub fn open(bytes: &'a [u8], input: &str) -> Result<Self> {
        let err = |message: String| Error::decode(input, message);

        if bytes.len() < HEADER_LEN {
            return Err(err(format!("truncated header ({} bytes)", bytes.len())));
        }
        if bytes[0..4] != MAGIC {
            return Err(err("bad magic, not an openbook binary book".into()));
        }
        let version = read_u16(bytes, 4);
        if version != VERSION {
            return Err(err(format!("unsupported version {version}")));
        }
        let flags = read_u16(bytes, 6);
        if flags != 0 {
            return Err(err(format!("unsupported flags {flags:#06x}")));
        }
        let node_count = read_u32(bytes, 8) as usize;
        let edge_count = read_u32(bytes, 12) as usize;
        let root = read_u32(bytes, 16) as usize;
        let fen_bytes = read_u32(bytes, 20) as usize;

        let expected = node_count
            .checked_mul(NODE_LEN)
            .and_then(|n| edge_count.checked_mul(EDGE_LEN).and_then(|e| n.checked_add(e)))
            .and_then(|t| t.checked_add(HEADER_LEN + fen_bytes))
            .ok_or_else(|| err("table sizes overflow".into()))?;
        if bytes.len() != expected {
            return Err(err(format!(
                "length {} does not match header (expected {expected} bytes)",
                bytes.len()
            )));
        }
        if node_count == 0 {
            return Err(err("book has no nodes".into()));
        }
        if root >= node_count {
            return Err(err(format!("root index {root} out of range ({node_count} nodes)")));
        }

        let view = Self {
            bytes,
            node_count,
            edge_count,
            root,
            nodes_at: HEADER_LEN,
            edges_at: HEADER_LEN + node_count * NODE_LEN,
            fens_at: HEADER_LEN + node_count * NODE_LEN + edge_count * EDGE_LEN,
        };
        view.validate(input, fen_bytes)?;
        Ok(view)
    }

    fn validate(&self, input: &str, fen_bytes: usize) -> Result<()> {
        let err = |message: String| Error::decode(input, message);
        let mut next_edge = 0usize;
        let mut previous_key: Option<u64> = None;

        for i in 0..self.node_count {
            let at = self.nodes_at + i * NODE_LEN;
            let key = read_u64(self.bytes, at);
            if previous_key.is_some_and(|p| p >= key) {
                return Err(err(format!("node {i}: keys not strictly ascending")));
            }
            previous_key = Some(key);

            let first = read_u32(self.bytes, at + 8) as usize;
            let count = read_u16(self.bytes, at + 12) as usize;
            if first != next_edge {
                return Err(err(format!("node {i}: edge range does not start at {next_edge}")));
            }
            next_edge += count;
            if next_edge > self.edge_count {
                return Err(err(format!("node {i}: edge range past end of edge table")));
            }

            let fen_len = read_u16(self.bytes, at + 14) as usize;
            let fen_offset = read_u32(self.bytes, at + 16) as usize;
            if fen_offset + fen_len > fen_bytes {
                return Err(err(format!("node {i}: FEN outside the FEN table")));
            }
            let start = self.fens_at + fen_offset;
            if std::str::from_utf8(&self.bytes[start..start + fen_len]).is_err() {
                return Err(err(format!("node {i}: FEN is not valid UTF-8")));
            }

            let mut previous_move: Option<u16> = None;
            for e in first..first + count {
                let at = self.edges_at + e * EDGE_LEN;
                let raw = read_u16(self.bytes, at);
                if MoveToken::from_raw(raw).is_none() {
                    return Err(err(format!("node {i}: invalid move encoding {raw:#06x}")));
                }
                if previous_move.is_some_and(|p| p >= raw) {
                    return Err(err(format!("node {i}: moves not strictly ascending")));
                }
                previous_move = Some(raw);
                let target = read_u32(self.bytes, at + 4) as usize;
                if target >= self.node_count {
                    return Err(err(format!("node {i}: move points at missing node {target}")));
                }
            }
        }
        if next_edge != self.edge_count {
            return Err(err(format!(
                "{} edges in table but nodes reference {next_edge}",
                self.edge_count
            )));
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn root(&self) -> BinaryNode<'a> {
        self.node(self.root)
    }

    pub fn nodes(&self) -> impl Iterator<Item = BinaryNode<'a>> + '_ {
        (0..self.node_count).map(move |i| self.node(i))
    }

    /// Find the node for `key` by binary search over the node table.
    pub fn lookup(&self, key: PositionKey) -> Option<BinaryNode<'a>> {
        let (mut lo, mut hi) = (0, self.node_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let candidate = self.key_at(mid);
            match candidate.cmp(&key.0) {
                std::cmp::Ordering::Equal => return Some(self.node(mid)),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    fn node(&self, index: usize) -> BinaryNode<'a> {
        BinaryNode { view: *self, index }
    }

    fn key_at(&self, index: usize) -> u64 {
        read_u64(self.bytes, self.nodes_at + index * NODE_LEN)
    }
}

impl<'a> BinaryNode<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    fn at(&self) -> usize {
        self.view.nodes_at + self.index * NODE_LEN
    }

    pub fn key(&self) -> PositionKey {
        PositionKey(self.view.key_at(self.index))
    }

    pub fn fen(&self) -> &'a str {
        let len = read_u16(self.view.bytes, self.at() + 14) as usize;
        let offset = read_u32(self.view.bytes, self.at() + 16) as usize;
        let start = self.view.fens_at + offset;
        // validated in `open`
        std::str::from_utf8(&self.view.bytes[start..start + len]).unwrap_or_default()
    }

    pub fn move_count(&self) -> usize {
        read_u16(self.view.bytes, self.at() + 12) as usize
    }

    /// Moves in ascending token order.
    pub fn moves(&self) -> impl Iterator<Item = (BinaryMove, usize)> + 'a {
        let view = self.view;
        let first = read_u32(view.bytes, self.at() + 8) as usize;
        (first..first + self.move_count()).filter_map(move |e| {
            let at = view.edges_at + e * EDGE_LEN;
            let mv = MoveToken::from_raw(read_u16(view.bytes, at))?;
            let target = read_u32(view.bytes, at + 4) as usize;
            Some((
                BinaryMove {
                    mv,
                    target: PositionKey(view.key_at(target)),
                    weight: read_u32(view.bytes, at + 8),
                    learn: read_u32(view.bytes, at + 12),
                },
                target,
            ))
        })
    }
}

// ============================================================================
// Decoding
// ============================================================================

pub fn decode(bytes: &[u8], input: &str, rules: &dyn RulesProvider) -> Result<BookGraph> {
    let view = BinaryBookView::open(bytes, input)?;

    let mut nodes = Vec::with_capacity(view.node_count());
    for node in view.nodes() {
        let position = rules
            .parse_fen(node.fen())
            .map_err(|e| Error::decode(input, format!("node {}: {e}", node.index())))?;
        let edges = node
            .moves()
            .map(|(m, target)| IndexedEdge {
                mv: m.mv,
                target,
                weight: u64::from(m.weight),
                learn: m.learn,
            })
            .collect();
        nodes.push(IndexedNode {
            position,
            stored_key: Some(node.key()),
            edges,
        });
    }
    assemble(nodes, view.root, input, rules)
}

// ============================================================================
// Byte helpers (callers guarantee bounds)
// ============================================================================

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_be_bytes(buf)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use openbook_rules::{RulesProvider, StandardRules};

    fn sample() -> BookGraph {
        let rules = StandardRules;
        let mut graph = BookGraph::from_start(&rules);
        let start = rules.start_position();
        for (text, weight, learn) in [("e2e4", 10u64, 0u32), ("d2d4", 4, 3)] {
            let mv: MoveToken = text.parse().unwrap();
            let pos = rules.apply_move(&start, mv).unwrap();
            let target = graph.get_or_create_node(rules.identity(&pos), pos);
            let edge = graph.get_or_create_edge(graph.root(), mv, target).unwrap();
            edge.weight = weight;
            edge.learn = learn;
        }
        graph
    }

    #[test]
    fn test_layout_sizes() {
        let rules = StandardRules;
        let graph = sample();
        let bytes = encode(&graph, &rules).unwrap();
        let view = BinaryBookView::open(&bytes, "mem").unwrap();

        assert_eq!(&bytes[0..4], b"OBK1");
        assert_eq!(view.node_count(), 3);
        assert_eq!(view.edge_count(), 2);
        let fen_total: usize = view.nodes().map(|n| n.fen().len()).sum();
        assert_eq!(bytes.len(), HEADER_LEN + 3 * NODE_LEN + 2 * EDGE_LEN + fen_total);
    }

    #[test]
    fn test_lookup_by_key() {
        let rules = StandardRules;
        let graph = sample();
        let bytes = encode(&graph, &rules).unwrap();
        let view = BinaryBookView::open(&bytes, "mem").unwrap();

        let root = view.lookup(graph.root_node().key).unwrap();
        let moves: Vec<BinaryMove> = root.moves().map(|(m, _)| m).collect();
        assert_eq!(moves.len(), 2);
        // ascending token order: d2d4 before e2e4
        assert_eq!(moves[0].mv.to_string(), "d2d4");
        assert_eq!((moves[0].weight, moves[0].learn), (4, 3));
        assert_eq!(moves[1].weight, 10);
        assert!(view.lookup(moves[1].target).is_some());
        assert!(view.lookup(PositionKey(12345)).is_none());
        assert_eq!(view.root().key(), graph.root_node().key);
    }

    #[test]
    fn test_round_trip() {
        let rules = StandardRules;
        let graph = sample();
        let decoded = decode(&encode(&graph, &rules).unwrap(), "mem", &rules).unwrap();
        assert_eq!(decoded.snapshot(), graph.snapshot());
    }

    #[test]
    fn test_weight_overflow_is_encode_error() {
        let rules = StandardRules;
        let mut graph = sample();
        graph.for_each_edge_mut(|e| e.weight = u64::from(u32::MAX) + 1);
        assert!(matches!(encode(&graph, &rules), Err(Error::Encode(_))));

        graph.for_each_edge_mut(|e| e.weight = u64::from(u32::MAX));
        assert!(encode(&graph, &rules).is_ok());
    }

    #[test]
    fn test_truncated_stream() {
        let rules = StandardRules;
        let bytes = encode(&sample(), &rules).unwrap();
        for cut in [0, 10, HEADER_LEN, bytes.len() - 1] {
            let err = decode(&bytes[..cut], "cut.bin", &rules).unwrap_err();
            assert!(matches!(err, Error::Decode { ref input, .. } if input == "cut.bin"));
        }
    }

    #[test]
    fn test_bad_magic_and_version() {
        let rules = StandardRules;
        let mut bytes = encode(&sample(), &rules).unwrap();
        bytes[0] = b'X';
        assert!(decode(&bytes, "mem", &rules).is_err());

        let mut bytes = encode(&sample(), &rules).unwrap();
        bytes[5] = 9;
        assert!(decode(&bytes, "mem", &rules).is_err());
    }

    #[test]
    fn test_dangling_target() {
        let rules = StandardRules;
        let mut bytes = encode(&sample(), &rules).unwrap();
        let first_edge = HEADER_LEN + 3 * NODE_LEN;
        bytes[first_edge + 4..first_edge + 8].copy_from_slice(&99u32.to_be_bytes());
        let err = decode(&bytes, "mem", &rules).unwrap_err();
        assert!(err.to_string().contains("missing node 99"), "{err}");
    }

    #[test]
    fn test_duplicate_move_rejected() {
        let rules = StandardRules;
        let mut bytes = encode(&sample(), &rules).unwrap();
        let first_edge = HEADER_LEN + 3 * NODE_LEN;
        let (a, b) = (first_edge, first_edge + EDGE_LEN);
        let mv = [bytes[a], bytes[a + 1]];
        bytes[b..b + 2].copy_from_slice(&mv);
        assert!(decode(&bytes, "mem", &rules).is_err());
    }

    #[test]
    fn test_key_mismatch_rejected() {
        let rules = StandardRules;
        let graph = BookGraph::from_start(&rules);
        let mut bytes = encode(&graph, &rules).unwrap();
        // a single node: any key is ascending, but it no longer matches the FEN
        bytes[HEADER_LEN + 7] ^= 1;
        assert!(decode(&bytes, "mem", &rules).is_err());
    }
}
