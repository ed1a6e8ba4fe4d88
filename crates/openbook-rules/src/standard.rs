//! `RulesProvider` backed by `shakmaty`.
//!
//! Moves cross the boundary as UCI text: a [`MoveToken`] renders to UCI and
//! `shakmaty` resolves it against the position, which also checks legality.
//! FEN output follows the standard layout with real move counters. The
//! en-passant field is written only when the capture is legal, the same rule
//! the identity key uses.

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position as _};

use crate::token::MoveToken;
use crate::{Position, PositionKey, RulesError, RulesProvider, Side};

/// Standard chess rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

pub(crate) fn zobrist_key(chess: &Chess) -> u64 {
    chess.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

pub(crate) fn fen_of(chess: &Chess) -> String {
    Fen::from_position(chess, EnPassantMode::Legal).to_string()
}

/// The legal `shakmaty` move for `mv`, if there is one.
fn legal_move(chess: &Chess, mv: MoveToken) -> Option<Move> {
    let uci: UciMove = mv.to_string().parse().ok()?;
    uci.to_move(chess).ok()
}

/// Castling comes out as the king's two-square move.
fn token_of(mv: Move) -> Option<MoveToken> {
    mv.to_uci(CastlingMode::Standard).to_string().parse().ok()
}

impl StandardRules {
    fn illegal(&self, position: &Position, mv: impl ToString) -> RulesError {
        RulesError::IllegalMove {
            mv: mv.to_string(),
            fen: self.to_fen(position),
        }
    }
}

impl RulesProvider for StandardRules {
    fn start_position(&self) -> Position {
        Position(Chess::default())
    }

    fn parse_fen(&self, fen: &str) -> Result<Position, RulesError> {
        let invalid = |reason: String| RulesError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let setup: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
        let chess: Chess = setup
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;
        Ok(Position(chess))
    }

    fn to_fen(&self, position: &Position) -> String {
        fen_of(&position.0)
    }

    fn apply_move(&self, position: &Position, mv: MoveToken) -> Result<Position, RulesError> {
        let m = legal_move(&position.0, mv).ok_or_else(|| self.illegal(position, mv))?;
        position
            .0
            .clone()
            .play(m)
            .map(Position)
            .map_err(|_| self.illegal(position, mv))
    }

    fn parse_move(&self, position: &Position, text: &str) -> Result<MoveToken, RulesError> {
        let trimmed = text.trim_end_matches(['+', '#', '!', '?']);

        if let Ok(mv) = trimmed.parse::<MoveToken>() {
            return match legal_move(&position.0, mv) {
                Some(_) => Ok(mv),
                None => Err(self.illegal(position, text)),
            };
        }

        let unparseable = |reason: String| RulesError::UnparseableMove {
            text: text.to_string(),
            fen: self.to_fen(position),
            reason,
        };
        let san_text = match trimmed {
            "0-0" => "O-O",
            "0-0-0" => "O-O-O",
            other => other,
        };
        let san: San = san_text.parse().map_err(|e| unparseable(format!("{e}")))?;
        let m = san.to_move(&position.0).map_err(|e| unparseable(format!("{e}")))?;
        token_of(m).ok_or_else(|| unparseable("not a board move".into()))
    }

    fn to_san(&self, position: &Position, mv: MoveToken) -> Result<String, RulesError> {
        let m = legal_move(&position.0, mv).ok_or_else(|| self.illegal(position, mv))?;
        Ok(SanPlus::from_move(position.0.clone(), m).to_string())
    }

    fn legal_moves(&self, position: &Position) -> Vec<MoveToken> {
        let mut moves: Vec<MoveToken> = position
            .0
            .legal_moves()
            .into_iter()
            .filter_map(token_of)
            .collect();
        moves.sort_unstable();
        moves
    }

    fn side_to_move(&self, position: &Position) -> Side {
        match position.0.turn() {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }

    fn identity(&self, position: &Position) -> PositionKey {
        PositionKey(zobrist_key(&position.0))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::START_FEN;

    fn play(rules: &StandardRules, moves: &[&str]) -> Position {
        let mut pos = rules.start_position();
        for m in moves {
            let mv = rules.parse_move(&pos, m).unwrap();
            pos = rules.apply_move(&pos, mv).unwrap();
        }
        pos
    }

    #[test]
    fn test_start_position_matches_fen() {
        let rules = StandardRules;
        let parsed = rules.parse_fen(START_FEN).unwrap();
        assert_eq!(rules.identity(&parsed), rules.identity(&rules.start_position()));
        assert_eq!(rules.side_to_move(&parsed), Side::White);
    }

    #[test]
    fn test_invalid_fen() {
        let rules = StandardRules;
        assert!(matches!(
            rules.parse_fen("not a fen"),
            Err(RulesError::InvalidFen { .. })
        ));
    }

    #[test]
    fn test_transposition_shares_identity() {
        let rules = StandardRules;
        let a = play(&rules, &["Nf3", "Nf6", "Nc3"]);
        let b = play(&rules, &["Nc3", "Nf6", "Nf3"]);
        assert_eq!(rules.identity(&a), rules.identity(&b));
    }

    #[test]
    fn test_san_and_uci_agree() {
        let rules = StandardRules;
        let start = rules.start_position();
        assert_eq!(
            rules.parse_move(&start, "Nf3").unwrap(),
            rules.parse_move(&start, "g1f3").unwrap()
        );
        assert_eq!(rules.parse_move(&start, "e4+").unwrap().to_string(), "e2e4");
    }

    #[test]
    fn test_castling_and_captures() {
        let rules = StandardRules;
        let pos = play(&rules, &["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"]);
        assert_eq!(rules.parse_move(&pos, "O-O").unwrap().to_string(), "e1g1");

        let pos = play(&rules, &["e4", "d5"]);
        assert_eq!(rules.parse_move(&pos, "exd5").unwrap().to_string(), "e4d5");
    }

    #[test]
    fn test_disambiguation() {
        let rules = StandardRules;
        // Knights on b1 and f3 can both reach d2 once the d-pawn has moved.
        let pos = play(&rules, &["Nf3", "e5", "d3", "e4"]);
        assert!(rules.parse_move(&pos, "Nd2").is_err(), "Nd2 is ambiguous");
        assert_eq!(rules.parse_move(&pos, "Nbd2").unwrap().to_string(), "b1d2");
        assert_eq!(rules.parse_move(&pos, "Nfd2").unwrap().to_string(), "f3d2");
    }

    #[test]
    fn test_promotion() {
        let rules = StandardRules;
        let pos = rules.parse_fen("8/P7/8/8/8/8/8/4K2k w - - 0 1").unwrap();
        assert_eq!(rules.parse_move(&pos, "a8=Q").unwrap().to_string(), "a7a8q");
        assert_eq!(rules.parse_move(&pos, "a8=N").unwrap().to_string(), "a7a8n");
        assert_eq!(rules.parse_move(&pos, "a7a8r").unwrap().to_string(), "a7a8r");
    }

    #[test]
    fn test_illegal_move_rejected() {
        let rules = StandardRules;
        let start = rules.start_position();
        let mv: MoveToken = "e2e5".parse().unwrap();
        assert!(matches!(
            rules.apply_move(&start, mv),
            Err(RulesError::IllegalMove { .. })
        ));
        assert!(rules.parse_move(&start, "Ke2").is_err());
        assert!(rules.parse_move(&start, "zz").is_err());
    }

    #[test]
    fn test_fen_writes_en_passant_target_and_counters() {
        let rules = StandardRules;
        let pos = play(&rules, &["e4", "a6", "e5", "f5"]);
        assert_eq!(
            rules.to_fen(&pos),
            "rnbqkbnr/1pppp1pp/p7/4Pp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3"
        );
        let reparsed = rules.parse_fen(&rules.to_fen(&pos)).unwrap();
        assert_eq!(rules.identity(&reparsed), rules.identity(&pos));
        assert_eq!(rules.parse_move(&pos, "exf6").unwrap().to_string(), "e5f6");
    }

    #[test]
    fn test_en_passant_only_counts_when_capturable() {
        let rules = StandardRules;
        // no black pawn can take on e3, so the key ignores the double step
        let pos = play(&rules, &["e4"]);
        assert!(rules.to_fen(&pos).contains(" b KQkq - 0 1"), "{}", rules.to_fen(&pos));
        let without_ep = rules
            .parse_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
            .unwrap();
        assert_eq!(rules.identity(&pos), rules.identity(&without_ep));
    }

    #[test]
    fn test_san_rendering() {
        let rules = StandardRules;
        let pos = play(&rules, &["e4", "e5", "Nf3", "Nc6", "Bc4", "Nf6"]);
        assert_eq!(rules.to_san(&pos, "e1g1".parse().unwrap()).unwrap(), "O-O");
        assert_eq!(rules.to_san(&pos, "f3g5".parse().unwrap()).unwrap(), "Ng5");
        assert_eq!(rules.to_san(&pos, "c4f7".parse().unwrap()).unwrap(), "Bxf7+");
        assert!(rules.to_san(&pos, "e1e3".parse().unwrap()).is_err());
    }

    #[test]
    fn test_legal_moves_sorted() {
        let rules = StandardRules;
        let moves = rules.legal_moves(&rules.start_position());
        assert_eq!(moves.len(), 20);
        assert!(moves.windows(2).all(|w| w[0] < w[1]));
    }
}
