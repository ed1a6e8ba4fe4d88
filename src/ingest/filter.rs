//! Per-game acceptance test for [`GameFilter`].

use crate::config::GameFilter;

use super::{GameRecord, GameResult};

impl GameFilter {
    /// Does `game` pass every active criterion?
    pub fn matches(&self, game: &GameRecord) -> bool {
        let drop_result = match game.result {
            GameResult::WhiteWin => self.no_wins || self.no_white_wins,
            GameResult::BlackWin => self.no_wins || self.no_black_wins,
            GameResult::Draw => self.no_draws,
        };
        if drop_result {
            return false;
        }

        let high = game.white_elo.max(game.black_elo);
        let low = game.white_elo.min(game.black_elo);
        let diff = high - low;

        at_least(low, self.min_elo)
            && at_most(high, self.max_elo)
            && at_least(high, self.min_high_elo)
            && at_most(low, self.max_low_elo)
            && at_least(diff, self.min_elo_diff)
            && at_most(diff, self.max_elo_diff)
            && at_least(game.full_moves(), self.min_game_length)
            && at_most(game.full_moves(), self.max_game_length)
            && at_least(game.time, self.min_time)
            && at_most(game.time, self.max_time)
            && at_least(game.increment, self.min_increment)
            && at_most(game.increment, self.max_increment)
    }
}

fn at_least<T: PartialOrd>(value: T, bound: Option<T>) -> bool {
    bound.is_none_or(|b| value >= b)
}

fn at_most<T: PartialOrd>(value: T, bound: Option<T>) -> bool {
    bound.is_none_or(|b| value <= b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(result: GameResult, white: u32, black: u32) -> GameRecord {
        GameRecord::new(result, ["e4", "e5", "Nf3"]).with_elo(white, black)
    }

    #[test]
    fn test_default_filter_accepts_everything() {
        let filter = GameFilter::default();
        assert!(filter.matches(&game(GameResult::Draw, 0, 0)));
        assert!(filter.matches(&game(GameResult::WhiteWin, 3000, 100)));
    }

    #[test]
    fn test_min_elo_applies_to_both_players() {
        let filter = GameFilter {
            min_elo: Some(2000),
            ..Default::default()
        };
        assert!(filter.matches(&game(GameResult::WhiteWin, 2000, 2100)));
        assert!(!filter.matches(&game(GameResult::WhiteWin, 2500, 1999)));
    }

    #[test]
    fn test_high_and_low_bounds() {
        let filter = GameFilter {
            min_high_elo: Some(2400),
            max_low_elo: Some(2000),
            ..Default::default()
        };
        assert!(filter.matches(&game(GameResult::Draw, 2400, 1900)));
        assert!(!filter.matches(&game(GameResult::Draw, 2300, 1900)));
        assert!(!filter.matches(&game(GameResult::Draw, 2500, 2100)));
    }

    #[test]
    fn test_elo_difference() {
        let filter = GameFilter {
            min_elo_diff: Some(100),
            max_elo_diff: Some(300),
            ..Default::default()
        };
        assert!(filter.matches(&game(GameResult::Draw, 2000, 2100)));
        assert!(filter.matches(&game(GameResult::Draw, 2300, 2000)));
        assert!(!filter.matches(&game(GameResult::Draw, 2000, 2050)));
        assert!(!filter.matches(&game(GameResult::Draw, 2000, 2400)));
    }

    #[test]
    fn test_result_flags_compose() {
        let filter = GameFilter {
            no_draws: true,
            no_white_wins: true,
            ..Default::default()
        };
        assert!(!filter.matches(&game(GameResult::Draw, 0, 0)));
        assert!(!filter.matches(&game(GameResult::WhiteWin, 0, 0)));
        assert!(filter.matches(&game(GameResult::BlackWin, 0, 0)));

        let no_wins = GameFilter {
            no_wins: true,
            ..Default::default()
        };
        assert!(no_wins.matches(&game(GameResult::Draw, 0, 0)));
        assert!(!no_wins.matches(&game(GameResult::BlackWin, 0, 0)));
    }

    #[test]
    fn test_game_length_in_full_moves() {
        // three plies = two full moves
        let filter = GameFilter {
            min_game_length: Some(2),
            max_game_length: Some(2),
            ..Default::default()
        };
        assert!(filter.matches(&game(GameResult::Draw, 0, 0)));

        let short = GameFilter {
            max_game_length: Some(1),
            ..Default::default()
        };
        assert!(!short.matches(&game(GameResult::Draw, 0, 0)));
    }

    #[test]
    fn test_time_control_bounds() {
        let filter = GameFilter {
            min_time: Some(180),
            max_increment: Some(2),
            ..Default::default()
        };
        let blitz = game(GameResult::Draw, 0, 0).with_time_control(180, 2);
        let bullet = game(GameResult::Draw, 0, 0).with_time_control(60, 0);
        let slow_inc = game(GameResult::Draw, 0, 0).with_time_control(600, 5);
        assert!(filter.matches(&blitz));
        assert!(!filter.matches(&bullet));
        assert!(!filter.matches(&slow_inc));
    }

    #[test]
    fn test_missing_rating_counts_as_zero() {
        let filter = GameFilter {
            min_elo: Some(1),
            ..Default::default()
        };
        assert!(!filter.matches(&GameRecord::new(GameResult::Draw, ["e4"])));
    }
}
