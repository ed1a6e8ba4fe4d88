//! End-to-end tests for the prune pipeline.
//!
//! Books are written in tree format, pruned through `apply_prune` with a
//! `PruneConfig`, and checked as graphs or as tree text again.

use openbook::codec::{self, BookFormat};
use openbook::prune::{self, PruneStep};
use openbook::{BookGraph, Error, PruneConfig};
use openbook_rules::{RulesProvider, StandardRules};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn book(tree: &str) -> BookGraph {
    codec::decode_bytes(BookFormat::Tree, tree.as_bytes(), "e2e.txt", &StandardRules).unwrap()
}

fn tree(graph: &BookGraph) -> String {
    let bytes = codec::encode_to_vec(graph, BookFormat::Tree, &StandardRules).unwrap();
    String::from_utf8(bytes).unwrap()
}

/// Prune, then render only what the root still reaches. Edge filters leave
/// orphaned positions behind; those would show up as detached blocks.
fn pruned(text: &str, config: PruneConfig) -> String {
    let mut graph = book(text);
    prune::apply_prune(&mut graph, &config, &StandardRules).unwrap();
    prune::remove_disconnected(&mut graph);
    tree(&graph)
}

const SAMPLE: &str = "\
5 e2e4
    3 c7c5
    3 e7e5, 2 g1f3
    1 e7e6
2 d2d4, 2 d7d5
";

// ============================================================================
// 1. Reachability
// ============================================================================

#[test]
fn test_remove_disconnected_drops_unreachable_cycle() {
    let rules = StandardRules;
    let start = rules.to_fen(&rules.start_position());
    // Knight shuffle after 1. d4: returns to the position it started from.
    let after_d4 = rules
        .apply_move(&rules.start_position(), "d2d4".parse().unwrap())
        .unwrap();
    let text = format!(
        "{start}\ne2e4\n@ {}\ng8f6, g1f3, f6g8, f3g1\n",
        rules.to_fen(&after_d4)
    );
    let mut graph = book(&text);
    assert_eq!(graph.node_count(), 6);
    assert_eq!(graph.edge_count(), 5);

    let config = PruneConfig {
        remove_disconnected: true,
        ..PruneConfig::default()
    };
    let report = prune::apply_prune(&mut graph, &config, &rules).unwrap();

    assert_eq!(report.nodes_removed(), 4);
    assert_eq!(report.edges_removed(), 4);
    assert_eq!(tree(&graph), "e4\n");
}

#[test]
fn test_set_root_then_remove_disconnected() {
    let rules = StandardRules;
    let after_e4 = rules
        .apply_move(&rules.start_position(), "e2e4".parse().unwrap())
        .unwrap();
    let config = PruneConfig {
        set_root: Some(rules.to_fen(&after_e4)),
        remove_disconnected: true,
        ..PruneConfig::default()
    };
    let mut graph = book(SAMPLE);
    prune::apply_prune(&mut graph, &config, &rules).unwrap();

    assert_eq!(graph.root_node().key, rules.identity(&after_e4));
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.edge_count(), 4);
}

// ============================================================================
// 2. Edge filters
// ============================================================================

#[test]
fn test_depth_one_keeps_root_moves_only() {
    let config = PruneConfig {
        depth: Some(1),
        ..PruneConfig::default()
    };
    let mut graph = book(SAMPLE);
    let report = prune::apply_prune(&mut graph, &config, &StandardRules).unwrap();

    assert_eq!(report.edges_removed(), 5);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.root_node().out_degree(), 2);
    // positions are kept, only their moves go
    assert_eq!(graph.node_count(), 8);
}

#[test]
fn test_weight_bounds() {
    let config = PruneConfig {
        min_weight: Some(2),
        max_weight: Some(3),
        ..PruneConfig::default()
    };
    let mut graph = book(SAMPLE);
    let report = prune::apply_prune(&mut graph, &config, &StandardRules).unwrap();

    // 5 e2e4 and 1 e7e6 go
    assert_eq!(report.edges_removed(), 2);
    assert!(report.ran(PruneStep::WeightBounds));
    assert_eq!(graph.root_node().out_degree(), 1);
}

#[test]
fn test_white_only_keeps_white_moves() {
    let config = PruneConfig {
        white_only: true,
        ..PruneConfig::default()
    };
    let mut graph = book(SAMPLE);
    prune::apply_prune(&mut graph, &config, &StandardRules).unwrap();

    // e2e4, g1f3 and d2d4 remain
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn test_keep_best_one() {
    let config = PruneConfig {
        keep_best: Some(1),
        ..PruneConfig::default()
    };
    // c7c5 and e7e5 tie at 3; the lower token (c7c5) stays
    assert_eq!(pruned(SAMPLE, config), "5 e4, 3 c5\n");
}

#[test]
fn test_keep_worst_one() {
    let config = PruneConfig {
        keep_worst: Some(1),
        ..PruneConfig::default()
    };
    assert_eq!(pruned(SAMPLE, config), "2 d4, 2 d5\n");
}

// ============================================================================
// 3. Weight rewrites
// ============================================================================

#[test]
fn test_scale_rounds_half_away_from_zero() {
    let config = PruneConfig {
        scale_weights: Some(0.5),
        ..PruneConfig::default()
    };
    let text = pruned("7 e2e4, 1 e7e5\n", config);
    assert_eq!(text, "4 e4, e5\n");
}

#[test]
fn test_uniform_and_clear_learning() {
    let config = PruneConfig {
        uniform: true,
        clear_learning: true,
        ..PruneConfig::default()
    };
    assert_eq!(pruned("9 e2e4 4, 3 e7e5 7\n", config), "e4, e5\n");
}

#[test]
fn test_steps_run_in_fixed_order() {
    // scale runs after keep-best, so the ranking sees the original weights
    let config = PruneConfig {
        keep_best: Some(1),
        scale_weights: Some(0.0),
        ..PruneConfig::default()
    };
    let text = pruned("3 e2e4\n2 d2d4\n", config);
    assert_eq!(text, "0 e4\n");
}

// ============================================================================
// 4. Configuration errors
// ============================================================================

#[test]
fn test_invalid_prune_config_is_rejected() {
    let rules = StandardRules;
    let configs = [
        PruneConfig {
            white_only: true,
            black_only: true,
            ..PruneConfig::default()
        },
        PruneConfig {
            scale_weights: Some(-1.0),
            ..PruneConfig::default()
        },
        PruneConfig {
            set_root: Some("not a fen".into()),
            ..PruneConfig::default()
        },
    ];
    for config in configs {
        let err = config.validate(&rules).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{config:?}: {err:?}");
    }
}
