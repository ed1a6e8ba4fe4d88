//! # Pipeline
//!
//! One run, strictly sequenced:
//!
//! ```text
//! validate config
//!   → ingest every PGN source into one book
//!   → decode every book source and merge, in input order
//!   → prune
//!   → encode into memory
//!   → write the sink
//! ```
//!
//! No stage starts before the previous one has finished with the graph.
//! Configuration errors are raised before any source is read, and the sink is
//! only opened once the complete encoding exists, so a failed run never leaves
//! partial output behind.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Write};
use std::path::PathBuf;

use openbook_rules::RulesProvider;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::{self, BookFormat};
use crate::config::BookConfig;
use crate::ingest::{self, IngestStats};
use crate::merge::{self, MergePolicy, MergeStats};
use crate::model::BookGraph;
use crate::prune::{self, PruneReport};
use crate::{Error, Result};

// ============================================================================
// Sources and sinks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Pgn,
    Book(BookFormat),
}

impl SourceFormat {
    /// Infer a format from a file name's extension.
    pub fn from_path(path: &str) -> Option<SourceFormat> {
        if path.to_ascii_lowercase().ends_with(".pgn") {
            return Some(SourceFormat::Pgn);
        }
        BookFormat::from_path(path).map(SourceFormat::Book)
    }
}

/// A named input stream.
pub struct Source<'a> {
    pub name: String,
    pub format: SourceFormat,
    reader: Box<dyn BufRead + 'a>,
}

impl<'a> Source<'a> {
    pub fn new(name: impl Into<String>, format: SourceFormat, reader: impl BufRead + 'a) -> Self {
        Self {
            name: name.into(),
            format,
            reader: Box::new(reader),
        }
    }

    pub fn from_bytes(name: impl Into<String>, format: SourceFormat, bytes: Vec<u8>) -> Source<'static> {
        Source::new(name, format, Cursor::new(bytes))
    }
}

impl Source<'static> {
    /// Open `arg` as a source. `-` is standard input. Without an explicit
    /// format the file extension decides.
    pub fn open(arg: &str, format: Option<SourceFormat>) -> Result<Self> {
        let format = format
            .or_else(|| SourceFormat::from_path(arg))
            .ok_or_else(|| Error::Config(format!("cannot infer the format of input '{arg}'")))?;
        if arg == "-" {
            return Ok(Source::new("<stdin>", format, io::stdin().lock()));
        }
        let file = File::open(arg).map_err(|e| Error::decode(arg, format!("cannot open: {e}")))?;
        Ok(Source::new(arg, format, BufReader::new(file)))
    }
}

impl std::fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

enum SinkTarget<'a> {
    Stdout,
    Path(PathBuf),
    Writer(&'a mut dyn Write),
}

/// The single output of a run. Files are created only when the encoded book
/// is ready to be written.
pub struct Sink<'a> {
    pub format: BookFormat,
    target: SinkTarget<'a>,
}

impl<'a> Sink<'a> {
    pub fn stdout(format: BookFormat) -> Self {
        Self {
            format,
            target: SinkTarget::Stdout,
        }
    }

    pub fn path(path: impl Into<PathBuf>, format: BookFormat) -> Self {
        Self {
            format,
            target: SinkTarget::Path(path.into()),
        }
    }

    pub fn writer(writer: &'a mut dyn Write, format: BookFormat) -> Self {
        Self {
            format,
            target: SinkTarget::Writer(writer),
        }
    }

    /// `-` is standard output. Without an explicit format the extension decides.
    pub fn from_arg(arg: &str, format: Option<BookFormat>) -> Result<Sink<'static>> {
        let format = format
            .or_else(|| BookFormat::from_path(arg))
            .ok_or_else(|| Error::Config(format!("cannot infer the format of output '{arg}'")))?;
        Ok(if arg == "-" {
            Sink::stdout(format)
        } else {
            Sink::path(arg, format)
        })
    }

    fn name(&self) -> String {
        match &self.target {
            SinkTarget::Stdout => "<stdout>".to_string(),
            SinkTarget::Path(path) => path.display().to_string(),
            SinkTarget::Writer(_) => "<writer>".to_string(),
        }
    }

    fn write_all(self, bytes: &[u8]) -> Result<()> {
        match self.target {
            SinkTarget::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()?;
            }
            SinkTarget::Path(path) => {
                let mut file = File::create(&path)?;
                file.write_all(bytes)?;
                file.flush()?;
            }
            SinkTarget::Writer(writer) => {
                writer.write_all(bytes)?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Run
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub ingest: IngestStats,
    pub merge: MergeStats,
    pub prune: PruneReport,
    pub nodes: usize,
    pub edges: usize,
    pub bytes_written: usize,
}

/// Execute one full run.
///
/// With PGN sources the book built from them is the working graph and every
/// book source merges into it. Otherwise the first book source is the working
/// graph. With no sources at all the result is an empty book.
pub fn run(
    config: &BookConfig,
    sources: Vec<Source<'_>>,
    sink: Sink<'_>,
    rules: &dyn RulesProvider,
) -> Result<RunReport> {
    config.validate(rules)?;
    let mut report = RunReport::default();

    let (pgn_sources, book_sources): (Vec<_>, Vec<_>) = sources
        .into_iter()
        .partition(|s| s.format == SourceFormat::Pgn);

    let mut graphs = Vec::with_capacity(book_sources.len() + 1);

    if !pgn_sources.is_empty() {
        info!(sources = pgn_sources.len(), "building book from pgn sources");
        let mut book = BookGraph::from_start(rules);
        for source in pgn_sources {
            let games = ingest::pgn::read_games(source.reader, &source.name);
            report.ingest += ingest::ingest_games(&mut book, games, &config.ingest, rules)?;
        }
        info!(
            games = report.ingest.games_ingested,
            nodes = book.node_count(),
            edges = book.edge_count(),
            "pgn book built"
        );
        graphs.push(book);
    }

    for mut source in book_sources {
        let SourceFormat::Book(format) = source.format else {
            continue;
        };
        let graph = codec::decode(format, &mut source.reader, &source.name, rules)?;
        info!(
            source = %source.name,
            %format,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "read book"
        );
        graphs.push(graph);
    }

    if graphs.len() > 1 {
        info!(books = graphs.len(), "merging book sources");
    }
    let mut book = match merge::merge_all(graphs, MergePolicy::from(&config.merge))? {
        Some((book, stats)) => {
            report.merge = stats;
            book
        }
        None => BookGraph::from_start(rules),
    };

    info!("applying modifications");
    report.prune = prune::apply_prune(&mut book, &config.prune, rules)?;
    report.nodes = book.node_count();
    report.edges = book.edge_count();

    let bytes = codec::encode_to_vec(&book, sink.format, rules)?;
    info!(
        sink = %sink.name(),
        format = %sink.format,
        nodes = report.nodes,
        edges = report.edges,
        bytes = bytes.len(),
        "writing book"
    );
    sink.write_all(&bytes)?;
    report.bytes_written = bytes.len();
    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
