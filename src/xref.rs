//! Cross-reference resolution.
//!
//! [`ReferenceScanner`] finds "see X" phrases in prose during extraction.
//! [`resolve_references`] runs once both collections are complete and turns
//! variants, explicit links and textual phrases into graph edges, filling in
//! the resolved targets on the records as it goes.

use crate::error::Result;
use crate::model::{EdgeType, ReferenceEdge, Record, Source, TextualReference};
use crate::normalize::normalize_lemma;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Finds referring phrases ("vide", "siehe", ...) followed by a candidate term.
#[derive(Debug, Clone)]
pub struct ReferenceScanner {
    pattern: Option<Regex>,
    max_words: usize,
}

impl ReferenceScanner {
    pub fn new<S: AsRef<str>>(markers: &[S], max_words: usize) -> Result<Self> {
        let mut markers: Vec<&str> = markers
            .iter()
            .map(|m| m.as_ref().trim())
            .filter(|m| !m.is_empty())
            .collect();
        if markers.is_empty() {
            return Ok(ReferenceScanner {
                pattern: None,
                max_words,
            });
        }
        // Longest first so "vid." never shadows a longer marker
        markers.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        markers.dedup();
        let alternation = markers
            .iter()
            .map(|m| regex::escape(m))
            .collect::<Vec<_>>()
            .join("|");
        let word = r"\p{L}[\p{L}\p{M}'’\-]*";
        let pattern = Regex::new(&format!(
            r"(?i)\b(?P<marker>{alternation})\s+(?P<term>{word}(?:\s+{word})*)"
        ))?;
        Ok(ReferenceScanner {
            pattern: Some(pattern),
            max_words: max_words.max(1),
        })
    }

    /// Every referring phrase in `text`, with its candidate capped at the
    /// configured number of words.
    pub fn scan(&self, text: &str) -> Vec<TextualReference> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .captures_iter(text)
            .map(|caps| {
                let marker = &caps["marker"];
                let phrase = caps["term"]
                    .split_whitespace()
                    .take(self.max_words)
                    .collect::<Vec<_>>()
                    .join(" ");
                TextualReference {
                    pattern: format!("{marker} {phrase}"),
                    phrase,
                    target: None,
                    target_source: None,
                }
            })
            .collect()
    }

    /// Byte offset of the first referring phrase.
    pub fn find_marker(&self, text: &str) -> Option<usize> {
        self.pattern.as_ref()?.find(text).map(|m| m.start())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    source: Source,
    id: String,
}

/// A resolution: the chosen record plus tied candidates that lost.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Choice {
    target: Target,
    alternates: Vec<String>,
}

/// Lookup tables over every record of every collection.
struct LemmaIndex {
    by_norm: HashMap<String, Vec<Target>>,
    ids: HashMap<Source, HashSet<String>>,
}

impl LemmaIndex {
    fn build(collections: &BTreeMap<Source, Vec<Record>>) -> Self {
        let mut by_norm: HashMap<String, Vec<Target>> = HashMap::new();
        let mut ids: HashMap<Source, HashSet<String>> = HashMap::new();
        for (&source, records) in collections {
            for record in records {
                ids.entry(source).or_default().insert(record.id.clone());
                if record.lemma_norm.is_empty() {
                    continue;
                }
                by_norm
                    .entry(record.lemma_norm.clone())
                    .or_default()
                    .push(Target {
                        source,
                        id: record.id.clone(),
                    });
            }
        }
        LemmaIndex { by_norm, ids }
    }

    fn has_id(&self, source: Source, id: &str) -> bool {
        self.ids.get(&source).is_some_and(|set| set.contains(id))
    }

    /// Same collection first, then the companion.
    fn by_id(&self, from: Source, id: &str) -> Option<Target> {
        [from, from.companion()]
            .into_iter()
            .find(|&source| self.has_id(source, id))
            .map(|source| Target {
                source,
                id: id.to_string(),
            })
    }

    /// Records whose `lemma_norm` equals `key`, excluding the asking record.
    ///
    /// Candidates in the asking record's own collection win; among those the
    /// lexicographically first id is chosen and the rest become alternates.
    fn by_lemma(&self, key: &str, from: Source, own_id: &str) -> Option<Choice> {
        let candidates: Vec<&Target> = self
            .by_norm
            .get(key)?
            .iter()
            .filter(|t| !(t.source == from && t.id == own_id))
            .collect();
        let preferred = if candidates.iter().any(|t| t.source == from) {
            from
        } else {
            from.companion()
        };
        let mut tied: Vec<&Target> = candidates
            .into_iter()
            .filter(|t| t.source == preferred)
            .collect();
        tied.sort_by(|a, b| a.id.cmp(&b.id));
        let (first, rest) = tied.split_first()?;
        Some(Choice {
            target: (*first).clone(),
            alternates: rest.iter().map(|t| t.id.clone()).collect(),
        })
    }
}

/// Reference graph plus per-collection tallies of dangling references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceGraph {
    pub edges: Vec<ReferenceEdge>,
    /// Explicit and textual references with no target, per collection
    pub unresolved: BTreeMap<Source, usize>,
    /// Textual matches that had more than one equally good target
    pub ambiguous: usize,
}

impl ReferenceGraph {
    pub fn unresolved_in(&self, source: Source) -> usize {
        self.unresolved.get(&source).copied().unwrap_or(0)
    }

    fn edge(&mut self, source: Source, source_id: &str, choice: Option<Choice>, edge_type: EdgeType, label: String) {
        let (target, alternates) = match choice {
            Some(c) => (Some(c.target), c.alternates),
            None => (None, Vec::new()),
        };
        self.edges.push(ReferenceEdge {
            source,
            source_id: source_id.to_string(),
            target_source: target.as_ref().map(|t| t.source),
            target_id: target.map(|t| t.id),
            edge_type,
            label,
            alternates,
        });
    }

    fn dangling(&mut self, source: Source) {
        *self.unresolved.entry(source).or_insert(0) += 1;
    }
}

/// Build the reference graph over all collections.
///
/// Pass one emits variant and explicit-link edges, pass two textual ones.
/// Records are updated in place: explicit references get `resolved`, textual
/// references get `target` and are narrowed to the matching words.
pub fn resolve_references(collections: &mut BTreeMap<Source, Vec<Record>>) -> ReferenceGraph {
    let index = LemmaIndex::build(collections);
    let mut graph = ReferenceGraph::default();
    for &source in collections.keys() {
        graph.unresolved.insert(source, 0);
    }

    for (&source, records) in collections.iter_mut() {
        for record in records.iter_mut() {
            structural_edges(&index, source, record, &mut graph);
        }
    }
    for (&source, records) in collections.iter_mut() {
        for record in records.iter_mut() {
            textual_edges(&index, source, record, &mut graph);
        }
    }

    for (source, count) in &graph.unresolved {
        if *count > 0 {
            info!("{}: {} references could not be resolved", source, count);
        }
    }
    graph
}

fn structural_edges(index: &LemmaIndex, source: Source, record: &mut Record, graph: &mut ReferenceGraph) {
    for variant in &record.variants {
        let choice = index.by_lemma(&normalize_lemma(variant), source, &record.id);
        graph.edge(source, &record.id, choice, EdgeType::Variant, variant.clone());
    }

    for reference in record.explicit_references.iter_mut() {
        let by_id = reference
            .target
            .as_deref()
            .and_then(|t| index.by_id(source, t))
            .map(|target| Choice {
                target,
                alternates: Vec::new(),
            });
        let choice = by_id.or_else(|| {
            [reference.target.as_deref(), Some(reference.text.as_str())]
                .into_iter()
                .flatten()
                .map(normalize_lemma)
                .filter(|key| !key.is_empty())
                .find_map(|key| index.by_lemma(&key, source, &record.id))
        });

        let label = match (&reference.label, reference.text.is_empty()) {
            (Some(lbl), false) => format!("{} {}", lbl, reference.text),
            (Some(lbl), true) => lbl.clone(),
            (None, false) => reference.text.clone(),
            (None, true) => reference.target.clone().unwrap_or_default(),
        };
        match &choice {
            Some(c) => {
                reference.resolved = Some(c.target.id.clone());
                reference.resolved_source = Some(c.target.source);
            }
            None => {
                warn!(
                    "{} {}: unresolved reference '{}'",
                    source,
                    record.id,
                    reference.target.as_deref().unwrap_or(&reference.text)
                );
                graph.dangling(source);
            }
        }
        graph.edge(source, &record.id, choice, EdgeType::ExplicitXref, label);
    }
}

fn textual_edges(index: &LemmaIndex, source: Source, record: &mut Record, graph: &mut ReferenceGraph) {
    for reference in record.textual_references.iter_mut() {
        let words: Vec<&str> = reference.phrase.split_whitespace().collect();
        // Longest prefix first: "vide Argentum vivum est" means "Argentum vivum"
        let found = (1..=words.len()).rev().find_map(|n| {
            let candidate = words[..n].join(" ");
            index
                .by_lemma(&normalize_lemma(&candidate), source, &record.id)
                .map(|choice| (candidate, choice))
        });

        match found {
            Some((candidate, choice)) => {
                if !choice.alternates.is_empty() {
                    debug!(
                        "{} {}: '{}' is ambiguous, chose {} over {:?}",
                        source, record.id, candidate, choice.target.id, choice.alternates
                    );
                    graph.ambiguous += 1;
                }
                let marker_len = reference.pattern.len().saturating_sub(reference.phrase.len());
                let marker = reference.pattern.get(..marker_len).unwrap_or("").to_string();
                reference.pattern = format!("{marker}{candidate}");
                reference.phrase = candidate;
                reference.target = Some(choice.target.id.clone());
                reference.target_source = Some(choice.target.source);
                graph.edge(source, &record.id, Some(choice), EdgeType::TextualVide, reference.pattern.clone());
            }
            None => {
                debug!("{} {}: no record for '{}'", source, record.id, reference.pattern);
                graph.dangling(source);
                graph.edge(source, &record.id, None, EdgeType::TextualVide, reference.pattern.clone());
            }
        }
    }
}
