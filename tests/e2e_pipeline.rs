//! End-to-end tests for full runs: sources in, one sink out.
//!
//! Each test exercises: validate -> PGN ingest -> book merge -> prune -> encode.

use std::io::Cursor;

use openbook::codec::{self, BookFormat};
use openbook::pipeline::{self, Sink, Source, SourceFormat};
use openbook::{BookConfig, Error};
use openbook_rules::{RulesProvider, StandardRules};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

const GAMES: &str = r#"[Event "one"]
[WhiteElo "2400"]
[BlackElo "2300"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 1-0

[Event "two"]
[WhiteElo "1500"]
[BlackElo "1600"]
[Result "0-1"]

1. d4 d5 0-1

[Event "three"]
[WhiteElo "2500"]
[BlackElo "2450"]
[Result "1/2-1/2"]

1. e4 c5 1/2-1/2
"#;

fn pgn(name: &str, text: &str) -> Source<'static> {
    Source::from_bytes(name, SourceFormat::Pgn, text.as_bytes().to_vec())
}

fn tree_source(name: &str, text: &str) -> Source<'static> {
    Source::from_bytes(name, SourceFormat::Book(BookFormat::Tree), text.as_bytes().to_vec())
}

fn run_to_tree(config: &BookConfig, sources: Vec<Source<'_>>) -> String {
    let mut out = Vec::new();
    pipeline::run(config, sources, Sink::writer(&mut out, BookFormat::Tree), &StandardRules).unwrap();
    String::from_utf8(out).unwrap()
}

// ============================================================================
// 1. Building
// ============================================================================

#[test]
fn test_pgn_to_tree() {
    let text = run_to_tree(&BookConfig::default(), vec![pgn("games.pgn", GAMES)]);
    assert_eq!(
        text,
        "\
3 e4
    c5
    0 e5, 2 Nf3, 0 Nc6
0 d4, 2 d5
"
    );
}

#[test]
fn test_several_pgn_sources_build_one_book() {
    let config = BookConfig::from_json_str(r#"{ "ingest": { "frequency": true } }"#).unwrap();
    let text = run_to_tree(
        &config,
        vec![pgn("a.pgn", "1. e4 e5 *\n"), pgn("b.pgn", "1. e4 c5 *\n")],
    );
    assert_eq!(text, "2 e4\n    c5\n    e5\n");
}

#[test]
fn test_filter_from_json_config() {
    let config = BookConfig::from_json_str(
        r#"{ "ingest": { "filter": { "min-elo": 2000, "no-draws": true } } }"#,
    )
    .unwrap();
    let mut out = Vec::new();
    let report = pipeline::run(
        &config,
        vec![pgn("games.pgn", GAMES)],
        Sink::writer(&mut out, BookFormat::Tree),
        &StandardRules,
    )
    .unwrap();

    assert_eq!(report.ingest.games_read, 3);
    assert_eq!(report.ingest.games_filtered, 2);
    assert_eq!(String::from_utf8(out).unwrap(), "2 e4, 0 e5, 2 Nf3, 0 Nc6\n");
}

// ============================================================================
// 2. Merging
// ============================================================================

#[test]
fn test_pgn_book_is_the_working_book() {
    let config = BookConfig::default();
    let sources = vec![
        tree_source("extra.txt", "9 e2e4\n4 c2c4\n"),
        pgn("games.pgn", "[Result \"1-0\"]\n\n1. e4 e5 1-0\n"),
    ];
    let text = run_to_tree(&config, sources);

    // e4 keeps the PGN weight, c4 is new
    assert_eq!(text, "4 c4\n2 e4, 0 e5\n");
}

#[test]
fn test_combine_entries_adds_book_weights() {
    let config = BookConfig::from_json_str(r#"{ "merge": { "combine-entries": true } }"#).unwrap();
    let sources = vec![
        pgn("games.pgn", "[Result \"1-0\"]\n\n1. e4 e5 1-0\n"),
        tree_source("extra.txt", "9 e2e4\n"),
    ];
    assert_eq!(run_to_tree(&config, sources), "11 e4, 0 e5\n");
}

#[test]
fn test_books_merge_in_input_order() {
    let config = BookConfig::default();
    let sources = vec![tree_source("a.txt", "5 e2e4\n"), tree_source("b.txt", "2 e2e4\n")];
    assert_eq!(run_to_tree(&config, sources), "5 e4\n");

    let sources = vec![tree_source("b.txt", "2 e2e4\n"), tree_source("a.txt", "5 e2e4\n")];
    assert_eq!(run_to_tree(&config, sources), "2 e4\n");
}

// ============================================================================
// 3. Modifying and converting
// ============================================================================

#[test]
fn test_prune_runs_after_merge() {
    let config = BookConfig::from_json_str(
        r#"{ "prune": { "keep-best": 1, "remove-disconnected": true } }"#,
    )
    .unwrap();
    let sources = vec![tree_source("a.txt", "5 e2e4\n"), tree_source("b.txt", "7 d2d4\n")];

    let mut out = Vec::new();
    let report = pipeline::run(
        &config,
        sources,
        Sink::writer(&mut out, BookFormat::Json),
        &StandardRules,
    )
    .unwrap();

    assert_eq!(report.edges, 1);
    let book = codec::decode_bytes(BookFormat::Json, &out, "out.json", &StandardRules).unwrap();
    assert_eq!(book.root_node().edges()[0].mv.to_string(), "d2d4");
}

#[test]
fn test_convert_binary_to_blob() {
    let rules = StandardRules;
    let source_book =
        codec::decode_bytes(BookFormat::Tree, b"3 e2e4\n    2 c7c5\n    e7e5\n", "in.txt", &rules)
            .unwrap();
    let bytes = codec::encode_to_vec(&source_book, BookFormat::Binary, &rules).unwrap();

    let mut out = Vec::new();
    let report = pipeline::run(
        &BookConfig::default(),
        vec![Source::new("in.bin", SourceFormat::Book(BookFormat::Binary), Cursor::new(bytes))],
        Sink::writer(&mut out, BookFormat::TreeBlob),
        &rules,
    )
    .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "3e4(2c5/e5)\n");
    assert_eq!(report.nodes, 4);
}

#[test]
fn test_set_root_output() {
    let rules = StandardRules;
    let after_e4 = rules
        .apply_move(&rules.start_position(), "e2e4".parse().unwrap())
        .unwrap();
    let mut config = BookConfig::default();
    config.prune.set_root = Some(rules.to_fen(&after_e4));
    config.prune.remove_disconnected = true;

    let text = run_to_tree(&config, vec![tree_source("in.txt", "3 e2e4\n    2 c7c5\n    e7e5\n")]);
    let book = codec::decode_bytes(BookFormat::Tree, text.as_bytes(), "out.txt", &rules).unwrap();

    assert_eq!(book.root_node().key, rules.identity(&after_e4));
    assert_eq!(book.edge_count(), 2);
}

// ============================================================================
// 4. Failures
// ============================================================================

#[test]
fn test_bad_book_source_fails_the_run() {
    let mut out = Vec::new();
    let err = pipeline::run(
        &BookConfig::default(),
        vec![tree_source("broken.txt", "e2e4\n        e7e5\n")],
        Sink::writer(&mut out, BookFormat::Tree),
        &StandardRules,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Decode { ref input, .. } if input == "broken.txt"), "{err:?}");
    assert!(out.is_empty(), "nothing may be written after a failure");
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let err = BookConfig::from_json_str(r#"{ "prune": { "keep-bset": 2 } }"#).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_unknown_config_section_is_rejected() {
    let err = BookConfig::from_json_str(r#"{ "prunee": { "remove-disconnected": true } }"#)
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("prunee"), "{err}");
}

#[test]
fn test_file_sink_is_written_only_on_success() {
    let dir = std::env::temp_dir().join(format!("openbook-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("book.json");
    let _ = std::fs::remove_file(&path);

    let mut config = BookConfig::default();
    config.prune.black_only = true;
    config.prune.white_only = true;
    let result = pipeline::run(
        &config,
        vec![pgn("games.pgn", GAMES)],
        Sink::path(&path, BookFormat::Json),
        &StandardRules,
    );
    assert!(result.is_err());
    assert!(!path.exists());

    pipeline::run(
        &BookConfig::default(),
        vec![pgn("games.pgn", GAMES)],
        Sink::path(&path, BookFormat::Json),
        &StandardRules,
    )
    .unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let book = codec::decode_bytes(BookFormat::Json, &bytes, "book.json", &StandardRules).unwrap();
    assert_eq!(book.node_count(), 8);

    std::fs::remove_dir_all(&dir).unwrap();
}
