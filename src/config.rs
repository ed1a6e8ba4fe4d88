//! Typed configuration for every pipeline stage.
//!
//! The CLI layer (not part of this crate) parses flags into a [`BookConfig`].
//! Each stage receives only its own section, so stages can be driven with
//! synthetic configurations in tests. Every field has a documented default
//! and all sections deserialize from JSON with kebab-case keys:
//!
//! ```json
//! { "ingest": { "frequency": true, "filter": { "min-elo": 2000, "no-draws": true } },
//!   "prune":  { "remove-disconnected": true, "keep-best": 3 } }
//! ```

use openbook_rules::RulesProvider;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Count used for keep-best / keep-worst when the flag is given without a number.
pub const DEFAULT_KEEP: usize = 1;

// ============================================================================
// BookConfig
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BookConfig {
    pub ingest: IngestConfig,
    pub merge: MergeConfig,
    pub prune: PruneConfig,
}

impl BookConfig {
    /// Parse a JSON configuration document. Unknown keys are rejected.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Config(format!("invalid configuration: {e}")))
    }

    /// Check every configuration-error condition. Called before any input is read.
    pub fn validate(&self, rules: &dyn RulesProvider) -> Result<()> {
        self.ingest.filter.validate()?;
        self.prune.validate(rules)
    }
}

// ============================================================================
// Ingestion
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct IngestConfig {
    /// Count every ply as 1 instead of weighting by result. Default: false.
    pub frequency: bool,
    /// Maximum plies consumed per game. Default: unbounded.
    pub pgn_depth: Option<usize>,
    pub filter: GameFilter,
}

/// Per-game acceptance criteria. All bounds are inclusive and `None` means
/// unbounded. Result flags are independent "drop" switches that compose by AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GameFilter {
    /// Both players at or above.
    pub min_elo: Option<u32>,
    /// Both players at or below.
    pub max_elo: Option<u32>,
    /// Stronger player at or above.
    pub min_high_elo: Option<u32>,
    /// Weaker player at or below.
    pub max_low_elo: Option<u32>,
    pub min_elo_diff: Option<u32>,
    pub max_elo_diff: Option<u32>,
    /// Length in full moves.
    pub min_game_length: Option<usize>,
    pub max_game_length: Option<usize>,
    /// Base time in seconds.
    pub min_time: Option<u32>,
    pub max_time: Option<u32>,
    /// Increment in seconds.
    pub min_increment: Option<u32>,
    pub max_increment: Option<u32>,
    pub no_draws: bool,
    /// Drop every decisive game.
    pub no_wins: bool,
    pub no_white_wins: bool,
    pub no_black_wins: bool,
}

impl GameFilter {
    fn validate(&self) -> Result<()> {
        let ranges = [
            ("elo", self.min_elo.map(u64::from), self.max_elo.map(u64::from)),
            ("elo-diff", self.min_elo_diff.map(u64::from), self.max_elo_diff.map(u64::from)),
            ("game-length", self.min_game_length.map(|v| v as u64), self.max_game_length.map(|v| v as u64)),
            ("time", self.min_time.map(u64::from), self.max_time.map(u64::from)),
            ("increment", self.min_increment.map(u64::from), self.max_increment.map(u64::from)),
        ];
        for (name, min, max) in ranges {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(Error::Config(format!(
                        "min-{name} ({min}) is greater than max-{name} ({max})"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Merge
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MergeConfig {
    /// Add later books' weights into existing edges instead of ignoring them.
    pub combine_entries: bool,
}

// ============================================================================
// Prune
// ============================================================================

/// Post-processing applied to the merged book. The steps always run in the
/// fixed order documented on `prune::apply_prune`, regardless of field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PruneConfig {
    /// FEN of the new root.
    pub set_root: Option<String>,
    pub remove_disconnected: bool,
    /// Maximum edge depth in plies from the root.
    pub depth: Option<usize>,
    pub min_weight: Option<u64>,
    pub max_weight: Option<u64>,
    pub white_only: bool,
    pub black_only: bool,
    /// Best moves kept per node. `true` keeps [`DEFAULT_KEEP`].
    #[serde(deserialize_with = "keep_count")]
    pub keep_best: Option<usize>,
    #[serde(deserialize_with = "keep_count")]
    pub keep_worst: Option<usize>,
    pub clear_learning: bool,
    pub uniform: bool,
    /// Non-negative multiplier, rounded half away from zero.
    pub scale_weights: Option<f64>,
}

/// `keep-best` / `keep-worst`: a count, or `true` for [`DEFAULT_KEEP`].
/// `false` and `null` leave the step off.
fn keep_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<usize>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keep {
        Flag(bool),
        Count(usize),
    }
    Ok(match Option::<Keep>::deserialize(deserializer)? {
        None | Some(Keep::Flag(false)) => None,
        Some(Keep::Flag(true)) => Some(DEFAULT_KEEP),
        Some(Keep::Count(n)) => Some(n),
    })
}

impl PruneConfig {
    pub fn validate(&self, rules: &dyn RulesProvider) -> Result<()> {
        if self.white_only && self.black_only {
            return Err(Error::Config(
                "white-only and black-only are mutually exclusive".into(),
            ));
        }
        if let Some(factor) = self.scale_weights {
            if !factor.is_finite() || factor < 0.0 {
                return Err(Error::Config(format!(
                    "scale-weights factor must be a non-negative number, got {factor}"
                )));
            }
        }
        if let Some(fen) = &self.set_root {
            rules
                .parse_fen(fen)
                .map_err(|e| Error::Config(format!("set-root: {e}")))?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
