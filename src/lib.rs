//! # openbook — Chess Opening Book Graph Engine
//!
//! Builds, merges, prunes and converts opening books: weighted graphs of
//! positions and candidate moves aggregated from game collections.
//!
//! ## Design Principles
//!
//! 1. **Position identity, not move order**: a node is a position; two move
//!    orders reaching the same position share one node.
//! 2. **Rules behind a trait**: chess rules come from `openbook_rules::RulesProvider`;
//!    the engine never inspects a board.
//! 3. **Stages are pure functions of (graph, config)**: decode → merge →
//!    ingest → prune → encode, strictly sequenced.
//! 4. **One typed configuration**: `BookConfig` carries every option with
//!    documented defaults; no ambient state.
//!
//! ## Quick Start
//!
//! ```rust
//! use openbook::{BookConfig, BookFormat, BookGraph, codec, ingest};
//! use openbook_rules::StandardRules;
//!
//! # fn example() -> openbook::Result<()> {
//! let rules = StandardRules;
//! let pgn = "[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 1-0\n";
//!
//! let config = BookConfig::default();
//! let mut book = BookGraph::from_start(&rules);
//! let games = ingest::pgn::read_games(pgn.as_bytes(), "example.pgn");
//! ingest::ingest_games(&mut book, games, &config.ingest, &rules)?;
//!
//! let mut out = Vec::new();
//! codec::encode(&book, BookFormat::Tree, &mut out, &rules)?;
//! assert_eq!(String::from_utf8(out).unwrap(), "2 e4, 0 e5, 2 Nf3\n");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Formats
//!
//! | Format | Module | Description |
//! |--------|--------|-------------|
//! | Binary | `codec::binary` | Compact sorted records, binary-searchable by position key |
//! | Tree | `codec::tree` | Indented human-readable move tree |
//! | Tree blob | `codec::tree` | The same tree on one line per block |
//! | JSON | `codec::json` | Self-describing interchange document |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod ingest;
pub mod merge;
pub mod prune;
pub mod codec;
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{BookGraph, BookSnapshot, Edge, Learn, Node, NodeId, Weight};
pub use config::{BookConfig, GameFilter, IngestConfig, MergeConfig, PruneConfig};
pub use codec::BookFormat;
pub use ingest::{GameRecord, GameResult, IngestStats};
pub use merge::{MergePolicy, MergeStats};
pub use prune::PruneReport;
pub use pipeline::{RunReport, Sink, Source, SourceFormat};

pub use openbook_rules::{MoveToken, Position, PositionKey, RulesError, RulesProvider, Side};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error in {input}: {message}")]
    Decode { input: String, message: String },

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn decode(input: &str, message: impl Into<String>) -> Self {
        Error::Decode {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
