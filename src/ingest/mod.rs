//! # Game Ingestion
//!
//! Turns game records into weighted paths through the book graph.
//!
//! ```text
//! GameRecord ──filter──► resolve (rayon) ──► apply (single writer) ──► BookGraph
//!                         SAN → MoveToken      get_or_create_node
//!                         via RulesProvider    get_or_create_edge / add_weight
//! ```
//!
//! Resolution replays each game's move text through the rules provider and is
//! independent per game, so it runs on the rayon pool in bounded chunks.
//! Mutation is applied by one writer in game order. Weight accumulation is a
//! sum, so the final graph does not depend on how the pool schedules work.
//!
//! A game whose moves the rules provider rejects is dropped with a warning and
//! ingestion continues. A malformed input stream (a decode error from the
//! reader) aborts ingestion.

pub mod filter;
pub mod pgn;

use std::ops::AddAssign;

use openbook_rules::{MoveToken, Position, RulesError, RulesProvider, Side};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::IngestConfig;
use crate::model::{BookGraph, Weight};
use crate::Result;

/// Games resolved per parallel batch.
const CHUNK_SIZE: usize = 1024;

// ============================================================================
// Game records
// ============================================================================

/// Outcome of a game. An unknown result (`*`) counts as a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    #[default]
    Draw,
}

impl GameResult {
    /// Parse a PGN result token. Returns `None` for anything that is not a
    /// termination marker.
    pub fn from_pgn(token: &str) -> Option<GameResult> {
        match token {
            "1-0" => Some(GameResult::WhiteWin),
            "0-1" => Some(GameResult::BlackWin),
            "1/2-1/2" | "½-½" | "*" => Some(GameResult::Draw),
            _ => None,
        }
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            GameResult::WhiteWin => Some(Side::White),
            GameResult::BlackWin => Some(Side::Black),
            GameResult::Draw => None,
        }
    }

    pub fn is_decisive(self) -> bool {
        self != GameResult::Draw
    }

    /// Result-weighted score for a ply played by `mover`:
    /// 2 for the winner, 1 for either side of a draw, 0 for the loser.
    pub fn weight_for(self, mover: Side) -> Weight {
        match self.winner() {
            Some(winner) if winner == mover => 2,
            Some(_) => 0,
            None => 1,
        }
    }
}

/// One game as read from an archive, before any chess rules are applied.
///
/// Ratings, time and increment default to 0 when missing or unparseable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRecord {
    /// Raw tag pairs in input order.
    pub tags: Vec<(String, String)>,
    pub white_elo: u32,
    pub black_elo: u32,
    /// Base time in seconds.
    pub time: u32,
    /// Increment in seconds.
    pub increment: u32,
    pub result: GameResult,
    /// Initial position from the `FEN` tag. `None` is the standard start.
    pub start_fen: Option<String>,
    /// Move text (SAN or UCI), one entry per ply.
    pub moves: Vec<String>,
}

impl GameRecord {
    pub fn new(result: GameResult, moves: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            result,
            moves: moves.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_elo(mut self, white: u32, black: u32) -> Self {
        self.white_elo = white;
        self.black_elo = black;
        self
    }

    pub fn with_time_control(mut self, time: u32, increment: u32) -> Self {
        self.time = time;
        self.increment = increment;
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn plies(&self) -> usize {
        self.moves.len()
    }

    /// Length in full moves: a trailing white ply counts as a full move.
    pub fn full_moves(&self) -> usize {
        self.moves.len().div_ceil(2)
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub games_read: usize,
    /// Dropped by the game filter.
    pub games_filtered: usize,
    /// Dropped because the rules provider rejected a move or the start FEN.
    pub games_rejected: usize,
    pub games_ingested: usize,
    pub plies_ingested: usize,
}

impl AddAssign for IngestStats {
    fn add_assign(&mut self, rhs: Self) {
        self.games_read += rhs.games_read;
        self.games_filtered += rhs.games_filtered;
        self.games_rejected += rhs.games_rejected;
        self.games_ingested += rhs.games_ingested;
        self.plies_ingested += rhs.plies_ingested;
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// A game replayed through the rules provider.
struct ResolvedGame {
    start: Position,
    plies: Vec<(MoveToken, Position)>,
}

/// Ingest `games` into `graph` according to `config`.
///
/// The iterator's errors are decode errors from the reader and abort the
/// run. Rules errors only drop the offending game.
pub fn ingest_games<I>(
    graph: &mut BookGraph,
    games: I,
    config: &IngestConfig,
    rules: &dyn RulesProvider,
) -> Result<IngestStats>
where
    I: IntoIterator<Item = Result<GameRecord>>,
{
    let mut stats = IngestStats::default();
    // (index in input order, game)
    let mut chunk: Vec<(usize, GameRecord)> = Vec::with_capacity(CHUNK_SIZE);

    for game in games {
        let game = game?;
        let index = stats.games_read;
        stats.games_read += 1;
        if !config.filter.matches(&game) {
            stats.games_filtered += 1;
            continue;
        }
        chunk.push((index, game));
        if chunk.len() == CHUNK_SIZE {
            ingest_chunk(graph, &chunk, config, rules, &mut stats)?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        ingest_chunk(graph, &chunk, config, rules, &mut stats)?;
    }

    debug!(
        games_read = stats.games_read,
        games_filtered = stats.games_filtered,
        games_rejected = stats.games_rejected,
        games_ingested = stats.games_ingested,
        plies = stats.plies_ingested,
        "ingestion finished"
    );
    Ok(stats)
}

fn ingest_chunk(
    graph: &mut BookGraph,
    chunk: &[(usize, GameRecord)],
    config: &IngestConfig,
    rules: &dyn RulesProvider,
    stats: &mut IngestStats,
) -> Result<()> {
    let resolved: Vec<std::result::Result<ResolvedGame, RulesError>> = chunk
        .par_iter()
        .map(|(_, game)| resolve_game(game, config.pgn_depth, rules))
        .collect();

    for ((index, game), outcome) in chunk.iter().zip(resolved) {
        match outcome {
            Ok(resolved) => {
                stats.plies_ingested += apply_game(graph, &resolved, game.result, config, rules)?;
                stats.games_ingested += 1;
            }
            Err(error) => {
                warn!(game = index, %error, "dropping game");
                stats.games_rejected += 1;
            }
        }
    }
    Ok(())
}

/// Replay up to `depth` plies of `game`.
fn resolve_game(
    game: &GameRecord,
    depth: Option<usize>,
    rules: &dyn RulesProvider,
) -> std::result::Result<ResolvedGame, RulesError> {
    let start = match &game.start_fen {
        Some(fen) => rules.parse_fen(fen)?,
        None => rules.start_position(),
    };
    let limit = depth.unwrap_or(usize::MAX).min(game.moves.len());

    let mut plies = Vec::with_capacity(limit);
    let mut position = start.clone();
    for text in &game.moves[..limit] {
        let mv = rules.parse_move(&position, text)?;
        position = rules.apply_move(&position, mv)?;
        plies.push((mv, position.clone()));
    }
    Ok(ResolvedGame { start, plies })
}

/// Add one resolved game to the graph. Returns the number of plies applied.
fn apply_game(
    graph: &mut BookGraph,
    game: &ResolvedGame,
    result: GameResult,
    config: &IngestConfig,
    rules: &dyn RulesProvider,
) -> Result<usize> {
    let mut node = graph.get_or_create_node(rules.identity(&game.start), game.start.clone());
    let mut before = &game.start;

    for (mv, after) in &game.plies {
        let mv = *mv;
        let delta = if config.frequency {
            1
        } else {
            result.weight_for(rules.side_to_move(before))
        };
        let target = graph.get_or_create_node(rules.identity(after), after.clone());
        let edge = graph.get_or_create_edge(node, mv, target)?;
        edge.weight = edge.weight.saturating_add(delta);
        node = target;
        before = after;
    }
    Ok(game.plies.len())
}

// ============================================================================
// Tests
// ============================================================================
