//! Conversion pipeline.
//!
//! Each collection is parsed and extracted on its own thread. Within a
//! collection, articles are extracted in parallel chunks and re-joined in
//! document order before ids are assigned, so the result does not depend on
//! scheduling. Cross-reference resolution waits for both collections.

use crate::config::Config;
use crate::error::Result;
use crate::extract::{locate_entries, Article, EntrySite, Extractor, SkippedArticle};
use crate::ids::{Duplicate, IdAssigner};
use crate::letters::build_letter_index;
use crate::model::{CollectionMetadata, LetterIndex, Record, Source};
use crate::search::SearchIndex;
use crate::symbols::SymbolRegistry;
use crate::tei::TeiDocument;
use crate::writer::ArtifactWriter;
use crate::xref::{resolve_references, ReferenceGraph, ReferenceScanner};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Per-collection tallies for the completion summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionStats {
    pub total_articles: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub duplicate_ids: usize,
    pub symbols_declared: usize,
    pub undeclared_symbols: usize,
    pub unresolved_references: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// One converted collection.
#[derive(Debug)]
pub struct Collection {
    pub source: Source,
    pub metadata: CollectionMetadata,
    pub records: Vec<Record>,
    pub symbols: SymbolRegistry,
    pub duplicates: Vec<Duplicate>,
    pub skipped: Vec<SkippedArticle>,
    pub letter_index: LetterIndex,
    pub search_index: SearchIndex,
    pub stats: CollectionStats,
}

/// A collection that could not be converted at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub source: Source,
    pub path: PathBuf,
    pub message: String,
}

/// Everything one run produces.
#[derive(Debug)]
pub struct ArtifactSet {
    pub collections: Vec<Collection>,
    pub graph: ReferenceGraph,
    pub failures: Vec<Failure>,
}

impl ArtifactSet {
    pub fn collection(&self, source: Source) -> Option<&Collection> {
        self.collections.iter().find(|c| c.source == source)
    }

    /// Serialize every artifact into `dir`. With no converted collection
    /// only the conversion report is written.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut writer = ArtifactWriter::create(dir)?;
        if self.collections.is_empty() {
            writer.write_report(self)?;
        } else {
            writer.write_all(self)?;
        }
        Ok(writer.into_written())
    }
}

/// Extracted collection before cross-references are resolved.
struct Extracted {
    source: Source,
    metadata: CollectionMetadata,
    records: Vec<Record>,
    symbols: SymbolRegistry,
    duplicates: Vec<Duplicate>,
    skipped: Vec<SkippedArticle>,
    stats: CollectionStats,
}

/// Convert the two dictionaries and write all artifacts to `output`.
pub fn run(ruland: &Path, sommerhoff: &Path, output: &Path, config: &Config) -> Result<ArtifactSet> {
    let inputs = [
        (Source::Ruland, ruland.to_path_buf()),
        (Source::Sommerhoff, sommerhoff.to_path_buf()),
    ];
    let artifacts = convert(&inputs, config)?;
    let written = artifacts.write(output)?;
    info!("Wrote {} artifacts to {}", written.len(), output.display());
    Ok(artifacts)
}

/// Convert the given documents. A document that cannot be read or parsed
/// becomes a [`Failure`] without affecting the others.
pub fn convert(inputs: &[(Source, PathBuf)], config: &Config) -> Result<ArtifactSet> {
    let scanner = config.scanner()?;
    let results: Vec<(Source, &PathBuf, Result<Extracted>)> = thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|(source, path)| {
                let scanner = &scanner;
                let handle = scope.spawn(move || load_collection(*source, path, config, scanner));
                (*source, path, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(source, path, handle)| {
                let result = handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
                (source, path, result)
            })
            .collect()
    });

    let mut extracted = Vec::new();
    let mut failures = Vec::new();
    for (source, path, result) in results {
        match result {
            Ok(collection) => extracted.push(collection),
            Err(e) => {
                error!("{}: conversion aborted: {}", source, e);
                failures.push(Failure {
                    source,
                    path: path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(finalize(extracted, failures))
}

/// Convert already-parsed documents.
pub fn convert_documents(documents: &[(Source, TeiDocument)], config: &Config) -> Result<ArtifactSet> {
    let scanner = config.scanner()?;
    let extracted: Vec<Extracted> = thread::scope(|scope| {
        let handles: Vec<_> = documents
            .iter()
            .map(|(source, doc)| {
                let scanner = &scanner;
                scope.spawn(move || extract_collection(*source, doc, config, scanner))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });
    Ok(finalize(extracted, Vec::new()))
}

fn load_collection(source: Source, path: &Path, config: &Config, scanner: &ReferenceScanner) -> Result<Extracted> {
    info!("{}: reading {}", source, path.display());
    let start = Instant::now();
    let doc = TeiDocument::load(path)?;
    debug!("{}: parsed {} bytes in {:?}", source, doc.text.len(), start.elapsed());
    let mut extracted = extract_collection(source, &doc, config, scanner);
    extracted.stats.elapsed = start.elapsed();
    Ok(extracted)
}

fn progress_bar(source: Source, len: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("{source}: articles"));
    pb
}

fn extract_collection(source: Source, doc: &TeiDocument, config: &Config, scanner: &ReferenceScanner) -> Extracted {
    let start = Instant::now();
    let sites = locate_entries(&doc.root);
    let extractor = Extractor::new(scanner);

    let pb = progress_bar(source, sites.len(), config.show_progress);
    let results = process_threaded(&extractor, doc, &sites, config.thread_count(), &pb);
    pb.finish_and_clear();

    // Single owner from here on: ids and symbol tallies follow document order
    let mut ids = IdAssigner::new(source);
    let mut symbols = SymbolRegistry::from_document(&doc.root);
    let mut records = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    let mut undeclared = 0;
    for result in results {
        match result {
            Ok(article) => {
                let id = ids.assign(article.preferred_id.as_deref(), article.position);
                for symbol in &article.symbols {
                    if symbols.note_reference(symbol) {
                        undeclared += 1;
                        warn!("{}: record '{}' cites undeclared symbol '{}'", source, id, symbol);
                    }
                }
                records.push(article.into_record(source, id));
            }
            Err(skip) => {
                warn!(
                    "{}: skipping article {} ({}): {}",
                    source,
                    skip.position,
                    skip.preferred_id.as_deref().unwrap_or("no id"),
                    skip.reason
                );
                skipped.push(skip);
            }
        }
    }

    let duplicates = ids.into_duplicates();
    let mut metadata = config.metadata(source);
    metadata.record_count = records.len();
    metadata.symbol_count = symbols.declared_count();

    let stats = CollectionStats {
        total_articles: sites.len(),
        extracted: records.len(),
        skipped: skipped.len(),
        duplicate_ids: duplicates.len(),
        symbols_declared: symbols.declared_count(),
        undeclared_symbols: undeclared,
        unresolved_references: 0,
        elapsed: start.elapsed(),
    };
    info!(
        "{}: {} articles, {} extracted, {} skipped, {} duplicate ids",
        source, stats.total_articles, stats.extracted, stats.skipped, stats.duplicate_ids
    );

    Extracted {
        source,
        metadata,
        records,
        symbols,
        duplicates,
        skipped,
        stats,
    }
}

/// Extract articles on up to `num_threads` threads. Results come back in
/// the order of `sites`.
fn process_threaded(
    extractor: &Extractor,
    doc: &TeiDocument,
    sites: &[EntrySite],
    num_threads: usize,
    pb: &ProgressBar,
) -> Vec<std::result::Result<Article, SkippedArticle>> {
    if sites.is_empty() {
        return vec![];
    }

    let num_threads = num_threads.min(sites.len()).max(1);
    let chunk_size = (sites.len() + num_threads - 1) / num_threads;

    thread::scope(|scope| {
        let handles: Vec<_> = sites
            .chunks(chunk_size)
            .enumerate()
            .map(|(i, chunk)| {
                let base = i * chunk_size;
                scope.spawn(move || {
                    chunk
                        .iter()
                        .enumerate()
                        .map(|(j, site)| {
                            let result = extractor.extract(doc, site, base + j);
                            pb.inc(1);
                            result
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut results = Vec::with_capacity(sites.len());
        for handle in handles {
            results.extend(handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)));
        }
        results
    })
}

/// Resolve references across collections, then build the per-collection indexes.
fn finalize(extracted: Vec<Extracted>, failures: Vec<Failure>) -> ArtifactSet {
    let mut records: BTreeMap<Source, Vec<Record>> = BTreeMap::new();
    let mut rest = Vec::new();
    for mut collection in extracted {
        records.insert(collection.source, std::mem::take(&mut collection.records));
        rest.push(collection);
    }

    let graph = resolve_references(&mut records);
    info!("Reference graph: {} edges", graph.edges.len());

    let mut collections: Vec<Collection> = rest
        .into_iter()
        .map(|mut c| {
            let records = records.remove(&c.source).unwrap_or_default();
            c.stats.unresolved_references = graph.unresolved_in(c.source);
            Collection {
                source: c.source,
                metadata: c.metadata,
                letter_index: build_letter_index(c.source, &records),
                search_index: SearchIndex::build(&records),
                records,
                symbols: c.symbols,
                duplicates: c.duplicates,
                skipped: c.skipped,
                stats: c.stats,
            }
        })
        .collect();
    collections.sort_by_key(|c| c.source);

    ArtifactSet {
        collections,
        graph,
        failures,
    }
}

/// Completion summary on stdout, printed whether or not the run fully succeeded.
pub fn print_summary(artifacts: &ArtifactSet) {
    // Nothing useful to do if stdout is gone
    let _ = write_summary(&mut io::stdout().lock(), artifacts);
}

pub fn write_summary<W: Write>(out: &mut W, artifacts: &ArtifactSet) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "============================================================")?;
    for c in &artifacts.collections {
        let s = &c.stats;
        writeln!(out, "Collection: {} ({})", c.source, c.metadata.title)?;
        writeln!(out, "Articles in source: {}", s.total_articles)?;
        writeln!(out, "Records extracted: {}", s.extracted)?;
        writeln!(out, "Articles skipped: {}", s.skipped)?;
        writeln!(out, "Duplicate ids renamed: {}", s.duplicate_ids)?;
        writeln!(out, "Symbols declared: {}", s.symbols_declared)?;
        writeln!(out, "Undeclared symbols: {}", s.undeclared_symbols)?;
        writeln!(out, "Unresolved references: {}", s.unresolved_references)?;
        writeln!(out, "Time: {}m {}s", s.elapsed.as_secs() / 60, s.elapsed.as_secs() % 60)?;
        writeln!(out, "------------------------------------------------------------")?;
    }
    let resolved = artifacts.graph.edges.iter().filter(|e| e.target_id.is_some()).count();
    writeln!(out, "Reference edges: {} ({} resolved)", artifacts.graph.edges.len(), resolved)?;
    writeln!(out, "Ambiguous textual matches: {}", artifacts.graph.ambiguous)?;
    for f in &artifacts.failures {
        writeln!(out, "FAILED {}: {} ({})", f.source, f.message, f.path.display())?;
    }
    writeln!(out, "============================================================")
}
