//! Chess rules provider for openbook.
//!
//! This crate isolates the `shakmaty` dependency so the book graph engine
//! never touches board internals. The engine sees positions only through
//! [`RulesProvider`]: it asks for a position's identity key, its side to move,
//! and the position reached by playing a [`MoveToken`].
//!
//! ```rust
//! use openbook_rules::{RulesProvider, StandardRules, Side};
//!
//! let rules = StandardRules;
//! let start = rules.start_position();
//! let mv = rules.parse_move(&start, "e4").unwrap();
//! let after = rules.apply_move(&start, mv).unwrap();
//!
//! assert_eq!(mv.to_string(), "e2e4");
//! assert_eq!(rules.side_to_move(&after), Side::Black);
//! assert_ne!(rules.identity(&start), rules.identity(&after));
//! ```

pub mod standard;
pub mod token;

use std::fmt;

pub use standard::StandardRules;
pub use token::{MoveToken, Promotion};

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// ============================================================================
// Position identity
// ============================================================================

/// Canonical identity of a position: a 64-bit Zobrist key covering piece
/// placement, side to move, castling rights and the en-passant square (only
/// when an en-passant capture is actually legal).
///
/// Two positions reached by different move orders share a key. This is the
/// only thing the graph uses to decide whether two positions are the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey(pub u64);

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

/// An opaque chess position.
///
/// Positions are only ever produced by a [`RulesProvider`], either from a FEN
/// string or by playing a move from another position. Equality is identity
/// equality: move counters are ignored.
#[derive(Clone)]
pub struct Position(pub(crate) shakmaty::Chess);

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        standard::zobrist_key(&self.0) == standard::zobrist_key(&other.0)
    }
}

impl Eq for Position {}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", standard::fen_of(&self.0))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("illegal move {mv} in position {fen}")]
    IllegalMove { mv: String, fen: String },

    #[error("cannot parse move '{text}' in position {fen}: {reason}")]
    UnparseableMove { text: String, fen: String, reason: String },
}

// ============================================================================
// RulesProvider
// ============================================================================

/// The chess capability consumed by the book engine.
///
/// Implementations must be deterministic: the same position and move always
/// produce the same resulting position and identity.
pub trait RulesProvider: Send + Sync {
    /// The standard initial position.
    fn start_position(&self) -> Position;

    /// Parse a FEN string.
    fn parse_fen(&self, fen: &str) -> Result<Position, RulesError>;

    /// Render a position as FEN.
    fn to_fen(&self, position: &Position) -> String;

    /// Play a move, failing if it is not legal in `position`.
    fn apply_move(&self, position: &Position, mv: MoveToken) -> Result<Position, RulesError>;

    /// Resolve move text (UCI or SAN) to a legal move in `position`.
    fn parse_move(&self, position: &Position, text: &str) -> Result<MoveToken, RulesError>;

    /// Render a legal move in SAN, check suffix included.
    fn to_san(&self, position: &Position, mv: MoveToken) -> Result<String, RulesError>;

    /// All legal moves, in ascending token order.
    fn legal_moves(&self, position: &Position) -> Vec<MoveToken>;

    fn side_to_move(&self, position: &Position) -> Side;

    /// Canonical identity key used for graph keying.
    fn identity(&self, position: &Position) -> PositionKey;
}
