//! Shared data model for extracted dictionary records.
//!
//! Field order is fixed so the JSON artifacts are stable across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The two source dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Martin Ruland, Lexicon Alchemiae (1612)
    Ruland,
    /// Johann Christoph Sommerhoff, Lexicon pharmaceutico-chymicum (1701)
    Sommerhoff,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Ruland, Source::Sommerhoff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ruland => "ruland",
            Source::Sommerhoff => "sommerhoff",
        }
    }

    /// The other collection, used as the fallback for reference lookups.
    pub fn companion(&self) -> Source {
        match self {
            Source::Ruland => Source::Sommerhoff,
            Source::Sommerhoff => Source::Ruland,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of headword element a lemma was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormRole {
    Lemma,
    Phrase,
    Variant,
    Other,
}

impl FormRole {
    pub fn from_type_attr(value: Option<&str>) -> FormRole {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("lemma") => FormRole::Lemma,
            Some("phrase") => FormRole::Phrase,
            Some("variant") => FormRole::Variant,
            _ => FormRole::Other,
        }
    }
}

/// Where in the article a gloss was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlossContext {
    Sense,
    Note,
    Entry,
}

/// A vernacular gloss attached to a sense or note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Formatting hint (`rend`/`style` attribute, or `lang-germ` for inline markers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub context: GlossContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<String>,
}

/// A cross-reference given by explicit markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplicitReference {
    #[serde(rename = "type")]
    pub ref_type: String,
    /// Target id or lemma as written in the markup, `#` stripped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub text: String,
    /// Record id the reference resolved to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    /// Collection of the `resolved` record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_source: Option<Source>,
}

/// A "see X" relationship found in free prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextualReference {
    /// Candidate term following the marker
    pub phrase: String,
    /// Full matched text, marker included
    pub pattern: String,
    pub target: Option<String>,
    pub target_source: Option<Source>,
}

/// One dictionary article after extraction and id assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub source: Source,
    pub lemma: String,
    pub lemma_norm: String,
    pub lemma_type: FormRole,
    pub letter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,
    pub variants: Vec<String>,
    pub translations: Vec<Translation>,
    pub definition: String,
    pub notes: Vec<Note>,
    pub symbols: Vec<String>,
    pub explicit_references: Vec<ExplicitReference>,
    pub textual_references: Vec<TextualReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facs: Option<String>,
    pub raw_markup: String,
}

/// A glyph declaration from the document header, or a placeholder for a
/// glyph that records cite without declaring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub description: String,
    pub unicode: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_mappings: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphic: Option<String>,
    pub declared: bool,
    pub reference_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeType {
    Variant,
    ExplicitXref,
    TextualVide,
}

/// One edge of the cross-reference graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub source: Source,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_source: Option<Source>,
    pub target_id: Option<String>,
    pub edge_type: EdgeType,
    pub label: String,
    /// Tied candidates that lost the tie-break
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterBucket {
    pub count: usize,
    pub entries: Vec<String>,
}

/// Master letter index of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterIndex {
    pub source: Source,
    pub letters: BTreeMap<String, LetterBucket>,
    pub total_entries: usize,
    /// Records whose lemma has no alphabetic character
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unindexed: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Descriptive metadata of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub title: String,
    pub author: String,
    pub year: u16,
    pub language: String,
    pub description: String,
    #[serde(default)]
    pub record_count: usize,
    #[serde(default)]
    pub symbol_count: usize,
}
