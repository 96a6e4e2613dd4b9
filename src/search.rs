//! Full-text search structure.
//!
//! An inverted index over five fields of every record. It is built from
//! ordered maps only, so identical records always serialize to identical
//! bytes. Ranking and query parsing belong to the consumer.

use crate::model::Record;
use crate::normalize::normalize_lemma;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SEARCH_INDEX_VERSION: u32 = 1;

/// Indexed fields, in serialization order.
pub const FIELDS: [&str; 5] = ["lemma", "lemma_norm", "variants", "translations", "definition"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    #[serde(rename = "ref")]
    pub id: String,
    pub lemma: String,
    /// Token count per field, for length normalization by the consumer
    pub field_lengths: BTreeMap<String, usize>,
}

/// `[document index, term frequency]`
pub type Posting = (usize, usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub version: u32,
    #[serde(rename = "ref")]
    pub ref_field: String,
    pub fields: Vec<String>,
    pub documents: Vec<SearchDocument>,
    /// term -> field -> postings, postings sorted by document index
    pub index: BTreeMap<String, BTreeMap<String, Vec<Posting>>>,
}

impl SearchIndex {
    pub fn build(records: &[Record]) -> SearchIndex {
        let mut documents = Vec::with_capacity(records.len());
        let mut index: BTreeMap<String, BTreeMap<String, Vec<Posting>>> = BTreeMap::new();

        for (doc, record) in records.iter().enumerate() {
            let mut field_lengths = BTreeMap::new();
            for field in FIELDS {
                let tokens = tokenize_all(field_values(record, field));
                field_lengths.insert(field.to_string(), tokens.len());

                let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
                for token in tokens {
                    *frequencies.entry(token).or_insert(0) += 1;
                }
                for (term, tf) in frequencies {
                    index
                        .entry(term)
                        .or_default()
                        .entry(field.to_string())
                        .or_default()
                        .push((doc, tf));
                }
            }
            documents.push(SearchDocument {
                id: record.id.clone(),
                lemma: record.lemma.clone(),
                field_lengths,
            });
        }

        SearchIndex {
            version: SEARCH_INDEX_VERSION,
            ref_field: "id".to_string(),
            fields: FIELDS.iter().map(|f| f.to_string()).collect(),
            documents,
            index,
        }
    }

    /// Ids of the documents containing `term` in any field, in document order.
    pub fn documents_for(&self, term: &str) -> Vec<&str> {
        let mut docs: Vec<usize> = self
            .index
            .get(&normalize_lemma(term))
            .into_iter()
            .flat_map(|fields| fields.values().flatten().map(|(doc, _)| *doc))
            .collect();
        docs.sort_unstable();
        docs.dedup();
        docs.into_iter().map(|d| self.documents[d].id.as_str()).collect()
    }
}

fn field_values<'a>(record: &'a Record, field: &str) -> Vec<&'a str> {
    match field {
        "lemma" => vec![record.lemma.as_str()],
        "lemma_norm" => vec![record.lemma_norm.as_str()],
        "variants" => record.variants.iter().map(String::as_str).collect(),
        "translations" => record.translations.iter().map(|t| t.text.as_str()).collect(),
        "definition" => vec![record.definition.as_str()],
        _ => Vec::new(),
    }
}

fn tokenize_all(values: Vec<&str>) -> Vec<String> {
    values.into_iter().flat_map(tokenize).collect()
}

/// Normalized alphanumeric runs of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_lemma(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
