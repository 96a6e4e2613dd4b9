//! Record identifiers.
//!
//! Ids are chosen as `xml:id`, else the article's `n`, else
//! `{source}:{position}`. Collisions get a `~dupN` suffix counted per base
//! id. The assigner is fed in document order by a single owner, so the
//! suffixes do not depend on how extraction was scheduled.

use crate::model::Source;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A suffixed id, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub base: String,
    pub assigned: String,
    pub position: usize,
}

#[derive(Debug)]
pub struct IdAssigner {
    source: Source,
    taken: HashSet<String>,
    collisions: HashMap<String, usize>,
    duplicates: Vec<Duplicate>,
}

impl IdAssigner {
    pub fn new(source: Source) -> Self {
        IdAssigner {
            source,
            taken: HashSet::new(),
            collisions: HashMap::new(),
            duplicates: Vec::new(),
        }
    }

    /// Fallback id for an article without identifying attributes.
    pub fn synthesized(&self, position: usize) -> String {
        format!("{}:{}", self.source, position)
    }

    /// Assign the id of the article at `position` (its 0-based index among
    /// all articles of the collection, skipped ones included).
    pub fn assign(&mut self, preferred: Option<&str>, position: usize) -> String {
        let base = preferred
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.synthesized(position));

        if self.taken.insert(base.clone()) {
            return base;
        }

        let counter = self.collisions.entry(base.clone()).or_insert(0);
        // A suffixed id may itself already be taken ("a~dup1" given explicitly)
        let assigned = loop {
            *counter += 1;
            let candidate = format!("{}~dup{}", base, counter);
            if !self.taken.contains(&candidate) {
                break candidate;
            }
        };
        self.taken.insert(assigned.clone());
        debug!("{}: duplicate id '{}' at article {} renamed to '{}'", self.source, base, position, assigned);
        self.duplicates.push(Duplicate {
            base,
            assigned: assigned.clone(),
            position,
        });
        assigned
    }

    pub fn duplicates(&self) -> &[Duplicate] {
        &self.duplicates
    }

    pub fn into_duplicates(self) -> Vec<Duplicate> {
        self.duplicates
    }
}
