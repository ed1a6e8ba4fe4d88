//! # Book Graph Model
//!
//! Positions are nodes, candidate moves are edges. Node identity is position
//! identity as reported by the rules provider, so transpositions collapse
//! into one node by construction.
//!
//! This module is pure data: no I/O and no chess rules beyond the opaque
//! `Position` / `PositionKey` handles.

pub mod edge;
pub mod graph;
pub mod node;

pub use edge::{Edge, Learn, Weight};
pub use graph::{BookGraph, BookSnapshot, SnapshotEdge};
pub use node::{EdgeList, Node, NodeId};
