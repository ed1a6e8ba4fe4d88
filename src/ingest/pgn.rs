//! Streaming PGN reader.
//!
//! A `pgn_reader::Visitor` over any `Read`, one game at a time, so archives
//! of millions of games never have to fit in memory. Only what ingestion
//! needs is kept: the tag pairs, the mainline SAN, and the `Result` tag.
//! Comments, NAGs and variations are skipped by the lexer.

use std::io::Read;
use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};

use super::{GameRecord, GameResult};
use crate::{Error, Result};

/// Iterate over the games in `reader`. `name` identifies the input in errors.
pub fn read_games<R: Read>(reader: R, name: &str) -> PgnReader<R> {
    PgnReader::new(reader, name)
}

/// Parse a `TimeControl` tag value into (base seconds, increment seconds).
///
/// Accepts `T`, `T+I`, `M/T` and `M/T+I`. Anything else (`-`, `?`,
/// multi-period controls) is unknown.
pub fn parse_time_control(value: &str) -> Option<(u32, u32)> {
    let value = value.trim();
    let body = match value.split_once('/') {
        Some((moves, rest)) => {
            moves.parse::<u32>().ok()?;
            rest
        }
        None => value,
    };
    match body.split_once('+') {
        Some((time, inc)) => Some((time.parse().ok()?, inc.parse().ok()?)),
        None => Some((body.parse().ok()?, 0)),
    }
}

/// Fold one tag pair into `record`. Unparseable ratings and time controls
/// stay 0; the raw pair is always kept.
fn apply_tag(record: &mut GameRecord, name: &str, value: String) {
    match name {
        "WhiteElo" => record.white_elo = value.trim().parse().unwrap_or(0),
        "BlackElo" => record.black_elo = value.trim().parse().unwrap_or(0),
        "TimeControl" => {
            let (time, increment) = parse_time_control(&value).unwrap_or((0, 0));
            record.time = time;
            record.increment = increment;
        }
        "Result" => {
            if let Some(result) = GameResult::from_pgn(value.trim()) {
                record.result = result;
            }
        }
        "FEN" => record.start_fen = Some(value.clone()),
        _ => {}
    }
    record.tags.push((name.to_string(), value));
}

// ============================================================================
// Visitor
// ============================================================================

/// Collects one `GameRecord` per game. The finished record is parked in
/// `finished` until the iterator takes it.
#[derive(Default)]
struct GameCollector {
    finished: Option<GameRecord>,
}

impl Visitor for GameCollector {
    type Tags = GameRecord;
    type Movetext = GameRecord;
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<(), GameRecord> {
        ControlFlow::Continue(GameRecord::default())
    }

    fn tag(&mut self, tags: &mut GameRecord, name: &[u8], value: RawTag<'_>) -> ControlFlow<()> {
        let name = String::from_utf8_lossy(name);
        apply_tag(tags, &name, value.decode_utf8_lossy().into_owned());
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: GameRecord) -> ControlFlow<(), GameRecord> {
        ControlFlow::Continue(tags)
    }

    fn san(&mut self, game: &mut GameRecord, san_plus: SanPlus) -> ControlFlow<()> {
        game.moves.push(san_plus.to_string());
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _game: &mut GameRecord) -> ControlFlow<(), Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, game: GameRecord) {
        self.finished = Some(game);
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Iterator over the games of a PGN stream.
///
/// Yields `Err` once when the underlying stream fails and then stops.
pub struct PgnReader<R> {
    reader: Reader<R>,
    collector: GameCollector,
    name: String,
    games_read: usize,
    done: bool,
}

impl<R: Read> PgnReader<R> {
    pub fn new(reader: R, name: &str) -> Self {
        Self {
            reader: Reader::new(reader),
            collector: GameCollector::default(),
            name: name.to_string(),
            games_read: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for PgnReader<R> {
    type Item = Result<GameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_game(&mut self.collector) {
            Ok(Some(())) => {
                self.games_read += 1;
                // end_game always runs for a game the reader returns
                let game = self.collector.finished.take().unwrap_or_default();
                Some(Ok(game))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                let message = format!("game {}: {e}", self.games_read + 1);
                Some(Err(Error::decode(&self.name, message)))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
