//! Tree text format and its one-line blob variant.
//!
//! ## Text
//!
//! ```text
//! 3 e4
//!     2 c5
//!     e5, Nf3 5
//! 2 d4, d5
//! ```
//!
//! Each entry is `[weight] san [learn]`; weight is omitted when it is 1 and
//! learn when it is 0. A line follows a single-reply chain, entries separated
//! by `, `. When a position has several replies the line ends and every reply
//! starts its own line, indented four spaces deeper than the line that reached
//! the position. The root's replies sit at indent 0. Replies are ordered by
//! weight (heaviest first), then by move.
//!
//! Every position is expanded once. A later move into an already expanded
//! position (a transposition or a cycle) is written as a plain entry and its
//! replies are not repeated.
//!
//! An optional first line holds the root FEN; it is written whenever the root
//! is not the standard start or the book has positions the root cannot reach.
//! Those positions follow as detached blocks, each introduced by `@ <fen>` and
//! laid out like the root's tree. `;` starts a comment.
//!
//! ## Blob
//!
//! ```text
//! 3e4(2c5/e5,Nf3 5)/2d4,d5
//! ```
//!
//! The same traversal on one line per block: `,` continues a chain, `( … )`
//! wraps the replies of a branching position, `/` separates alternatives and
//! the weight is glued to the move. Root FEN and `@ <fen>` header lines work
//! as in the text form, each followed by its block's line.
//!
//! Moves are written in SAN. Decoders accept SAN or UCI.

use hashbrown::HashSet;
use openbook_rules::RulesProvider;

use crate::model::{BookGraph, Edge, Learn, Node, NodeId, Weight};
use crate::{Error, Result};

const INDENT: usize = 4;

// ============================================================================
// Encoding
// ============================================================================

pub fn encode_text(graph: &BookGraph, rules: &dyn RulesProvider) -> Result<String> {
    TreeWriter::new(graph, rules).encode(Layout::Text)
}

pub fn encode_blob(graph: &BookGraph, rules: &dyn RulesProvider) -> Result<String> {
    TreeWriter::new(graph, rules).encode(Layout::Blob)
}

#[derive(Clone, Copy)]
enum Layout {
    Text,
    Blob,
}

/// A move still to be written, with the node it is played from.
#[derive(Clone, Copy)]
struct Reply {
    from: NodeId,
    edge: Edge,
}

enum BlobItem {
    Move(Reply),
    Text(&'static str),
}

struct TreeWriter<'a> {
    graph: &'a BookGraph,
    rules: &'a dyn RulesProvider,
    visited: HashSet<NodeId>,
    out: String,
}

impl<'a> TreeWriter<'a> {
    fn new(graph: &'a BookGraph, rules: &'a dyn RulesProvider) -> Self {
        Self {
            graph,
            rules,
            visited: HashSet::with_capacity(graph.node_count()),
            out: String::new(),
        }
    }

    fn encode(mut self, layout: Layout) -> Result<String> {
        let graph = self.graph;
        let start_key = self.rules.identity(&self.rules.start_position());
        let has_detached = graph.reachable_from(graph.root()).len() < graph.node_count();

        if graph.root_node().key != start_key || has_detached {
            self.out.push_str(&self.rules.to_fen(&graph.root_node().position));
            self.out.push('\n');
        }
        self.block(layout, graph.root())?;

        for id in graph.ids_by_key() {
            if self.visited.contains(&id) {
                continue;
            }
            if let Some(node) = graph.node(id) {
                self.out.push_str("@ ");
                self.out.push_str(&self.rules.to_fen(&node.position));
                self.out.push('\n');
            }
            self.block(layout, id)?;
        }
        Ok(self.out)
    }

    fn block(&mut self, layout: Layout, start: NodeId) -> Result<()> {
        match layout {
            Layout::Text => self.text_block(start),
            Layout::Blob => self.blob_block(start),
        }
    }

    fn replies(&self, id: NodeId) -> Vec<Reply> {
        self.graph
            .node(id)
            .map(Node::edges_by_weight)
            .unwrap_or_default()
            .into_iter()
            .map(|edge| Reply { from: id, edge })
            .collect()
    }

    /// Append `[weight] san [learn]`; the weight is glued to the move in blobs.
    fn push_entry(&mut self, reply: &Reply, glued: bool) -> Result<()> {
        let Reply { from, edge } = reply;
        let node = self
            .graph
            .node(*from)
            .ok_or_else(|| Error::NotFound(format!("Node {from}")))?;
        let san = self.rules.to_san(&node.position, edge.mv)?;

        if edge.weight != 1 {
            self.out.push_str(&edge.weight.to_string());
            if !glued {
                self.out.push(' ');
            }
        }
        self.out.push_str(&san);
        if edge.learn != 0 {
            self.out.push(' ');
            self.out.push_str(&edge.learn.to_string());
        }
        Ok(())
    }

    fn text_block(&mut self, start: NodeId) -> Result<()> {
        self.visited.insert(start);
        // (indent, reply) of lines still to write
        let mut pending: Vec<(usize, Reply)> =
            self.replies(start).into_iter().rev().map(|r| (0, r)).collect();

        while let Some((indent, reply)) = pending.pop() {
            self.out.push_str(&" ".repeat(indent));
            self.push_entry(&reply, false)?;

            let mut target = reply.edge.target;
            while self.visited.insert(target) {
                let next = self.replies(target);
                match next.as_slice() {
                    [] => break,
                    [only] => {
                        self.out.push_str(", ");
                        self.push_entry(only, false)?;
                        target = only.edge.target;
                    }
                    _ => {
                        pending.extend(next.iter().rev().map(|r| (indent + INDENT, *r)));
                        break;
                    }
                }
            }
            self.out.push('\n');
        }
        Ok(())
    }

    fn blob_block(&mut self, start: NodeId) -> Result<()> {
        self.visited.insert(start);
        let first = self.replies(start);
        if first.is_empty() {
            return Ok(());
        }
        let mut pending = Vec::new();
        push_alternatives(&mut pending, first);

        while let Some(item) = pending.pop() {
            let reply = match item {
                BlobItem::Text(text) => {
                    self.out.push_str(text);
                    continue;
                }
                BlobItem::Move(reply) => reply,
            };
            self.push_entry(&reply, true)?;

            let mut target = reply.edge.target;
            while self.visited.insert(target) {
                let next = self.replies(target);
                match next.as_slice() {
                    [] => break,
                    [only] => {
                        self.out.push(',');
                        self.push_entry(only, true)?;
                        target = only.edge.target;
                    }
                    _ => {
                        self.out.push('(');
                        pending.push(BlobItem::Text(")"));
                        push_alternatives(&mut pending, next);
                        break;
                    }
                }
            }
        }
        self.out.push('\n');
        Ok(())
    }
}

fn push_alternatives(pending: &mut Vec<BlobItem>, replies: Vec<Reply>) {
    for (i, reply) in replies.into_iter().enumerate().rev() {
        pending.push(BlobItem::Move(reply));
        if i > 0 {
            pending.push(BlobItem::Text("/"));
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// A non-blank line with its comment stripped.
struct Line<'t> {
    no: usize,
    indent: usize,
    body: &'t str,
}

fn significant_lines(text: &str) -> Vec<Line<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let content = raw.split(';').next().unwrap_or_default();
            let indent = content
                .chars()
                .take_while(|c| c.is_whitespace())
                .map(|c| if c == '\t' { INDENT } else { 1 })
                .sum();
            let body = content.trim();
            (!body.is_empty()).then_some(Line { no: i + 1, indent, body })
        })
        .collect()
}

/// Graph under construction plus error context.
struct TreeReader<'a> {
    graph: BookGraph,
    rules: &'a dyn RulesProvider,
    input: &'a str,
}

impl<'a> TreeReader<'a> {
    /// Start a graph from the optional root FEN line. Returns the reader and
    /// the number of lines consumed.
    fn open(lines: &[Line<'_>], input: &'a str, rules: &'a dyn RulesProvider) -> (Self, usize) {
        let root = lines
            .first()
            .filter(|line| !line.body.starts_with('@'))
            .and_then(|line| rules.parse_fen(line.body).ok());
        let consumed = usize::from(root.is_some());
        let graph = match root {
            Some(position) => BookGraph::rooted_at(rules, position),
            None => BookGraph::from_start(rules),
        };
        (Self { graph, rules, input }, consumed)
    }

    fn error(&self, line: usize, message: impl std::fmt::Display) -> Error {
        Error::decode(self.input, format!("line {line}: {message}"))
    }

    /// `@ <fen>`: the node a detached block hangs from.
    fn block(&mut self, fen: &str, line: usize) -> Result<NodeId> {
        let position = self
            .rules
            .parse_fen(fen.trim())
            .map_err(|e| self.error(line, e))?;
        Ok(self
            .graph
            .get_or_create_node(self.rules.identity(&position), position))
    }

    /// Add the edge described by `text` from `from`. Returns its target.
    fn add_entry(&mut self, from: NodeId, text: &str, glued: bool, line: usize) -> Result<NodeId> {
        let (weight, mv_text, learn) = parse_entry(text, glued).ok_or_else(|| {
            self.error(line, format!("malformed entry '{}'", text.trim()))
        })?;
        let position = self
            .graph
            .node(from)
            .map(|n| n.position.clone())
            .ok_or_else(|| Error::NotFound(format!("Node {from}")))?;
        let mv = self
            .rules
            .parse_move(&position, mv_text)
            .map_err(|e| self.error(line, e))?;
        let reached = self
            .rules
            .apply_move(&position, mv)
            .map_err(|e| self.error(line, e))?;
        let target = self
            .graph
            .get_or_create_node(self.rules.identity(&reached), reached);
        let inserted = self.graph.insert_edge(
            from,
            Edge::new(mv, target).with_weight(weight).with_learn(learn),
        )?;
        if !inserted {
            return Err(self.error(line, format!("duplicate move {mv}")));
        }
        Ok(target)
    }
}

/// `[weight] move [learn]`, or `[weight]move [learn]` when `glued`.
fn parse_entry(text: &str, glued: bool) -> Option<(Weight, &str, Learn)> {
    let mut tokens = text.split_whitespace();
    let first = tokens.next()?;

    let (weight, mv) = if glued {
        let split = first.find(|c: char| !c.is_ascii_digit())?;
        let weight = if split == 0 { 1 } else { first[..split].parse().ok()? };
        (weight, &first[split..])
    } else if first.bytes().all(|b| b.is_ascii_digit()) {
        (first.parse().ok()?, tokens.next()?)
    } else {
        (1, first)
    };
    let learn = match tokens.next() {
        Some(t) => t.parse().ok()?,
        None => 0,
    };
    if tokens.next().is_some() {
        return None;
    }
    Some((weight, mv, learn))
}

pub fn decode_text(text: &str, input: &str, rules: &dyn RulesProvider) -> Result<BookGraph> {
    let lines = significant_lines(text);
    let (mut reader, consumed) = TreeReader::open(&lines, input, rules);
    // (node, indent of its reply lines)
    let mut open: Vec<(NodeId, usize)> = vec![(reader.graph.root(), 0)];

    for line in &lines[consumed..] {
        if let Some(fen) = line.body.strip_prefix('@') {
            open = vec![(reader.block(fen, line.no)?, 0)];
            continue;
        }
        while open.last().is_some_and(|&(_, indent)| indent > line.indent) {
            open.pop();
        }
        let mut cursor = match open.last() {
            Some(&(node, indent)) if indent == line.indent => node,
            _ => return Err(reader.error(line.no, "unexpected indentation")),
        };
        for entry in line.body.split(',') {
            cursor = reader.add_entry(cursor, entry, false, line.no)?;
        }
        open.push((cursor, line.indent + INDENT));
    }
    Ok(reader.graph)
}

enum BlobToken<'t> {
    Entry(&'t str),
    Chain,
    Alternative,
    Open,
    Close,
}

fn blob_tokens(body: &str) -> Vec<BlobToken<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in body.char_indices() {
        let delimiter = match c {
            ',' => BlobToken::Chain,
            '/' => BlobToken::Alternative,
            '(' => BlobToken::Open,
            ')' => BlobToken::Close,
            _ => continue,
        };
        let entry = body[start..i].trim();
        if !entry.is_empty() {
            tokens.push(BlobToken::Entry(entry));
        }
        tokens.push(delimiter);
        start = i + c.len_utf8();
    }
    let entry = body[start..].trim();
    if !entry.is_empty() {
        tokens.push(BlobToken::Entry(entry));
    }
    tokens
}

#[derive(Clone, Copy, PartialEq)]
enum Expect {
    Entry,
    Separator,
    /// After `)`: only `/`, `)` or the end of the line.
    AfterClose,
}

fn decode_blob_line(reader: &mut TreeReader<'_>, block: NodeId, line: &Line<'_>) -> Result<()> {
    let mut frames = vec![block];
    let mut cursor = block;
    let mut expect = Expect::Entry;

    for token in blob_tokens(line.body) {
        match (token, expect) {
            (BlobToken::Entry(text), Expect::Entry) => {
                cursor = reader.add_entry(cursor, text, true, line.no)?;
                expect = Expect::Separator;
            }
            (BlobToken::Chain, Expect::Separator) => expect = Expect::Entry,
            (BlobToken::Open, Expect::Separator) => {
                frames.push(cursor);
                expect = Expect::Entry;
            }
            (BlobToken::Alternative, Expect::Separator | Expect::AfterClose) => {
                cursor = frames.last().copied().unwrap_or(block);
                expect = Expect::Entry;
            }
            (BlobToken::Close, Expect::Separator | Expect::AfterClose) if frames.len() > 1 => {
                frames.pop();
                expect = Expect::AfterClose;
            }
            _ => return Err(reader.error(line.no, "malformed tree")),
        }
    }
    if expect == Expect::Entry || frames.len() != 1 {
        return Err(reader.error(line.no, "unterminated tree"));
    }
    Ok(())
}

pub fn decode_blob(text: &str, input: &str, rules: &dyn RulesProvider) -> Result<BookGraph> {
    let lines = significant_lines(text);
    let (mut reader, consumed) = TreeReader::open(&lines, input, rules);
    let mut block = reader.graph.root();

    for line in &lines[consumed..] {
        if let Some(fen) = line.body.strip_prefix('@') {
            block = reader.block(fen, line.no)?;
            continue;
        }
        decode_blob_line(&mut reader, block, line)?;
    }
    Ok(reader.graph)
}

// ============================================================================
// Tests
// ============================================================================
