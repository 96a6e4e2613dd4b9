//! Run configuration, loaded from YAML.
//!
//! Every field has a default, so a missing file or a partial file is fine:
//!
//! ```yaml
//! threads: 4
//! show_progress: false
//! reference_markers: [vide, vid., siehe]
//! max_reference_words: 3
//! collections:
//!   ruland:
//!     title: Lexicon Alchemiae sive Dictionarium Alchemisticum
//! ```

use crate::error::{ConvertError, Result};
use crate::model::{CollectionMetadata, Source};
use crate::xref::ReferenceScanner;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::thread;

/// Descriptive metadata of the two dictionaries.
static CATALOG: Lazy<BTreeMap<Source, CollectionMetadata>> = Lazy::new(|| {
    let mut catalog = BTreeMap::new();
    catalog.insert(
        Source::Ruland,
        CollectionMetadata {
            title: "Lexicon Alchemiae".to_string(),
            author: "Martin Ruland the Younger".to_string(),
            year: 1612,
            language: "Latin with German translations".to_string(),
            description: "A comprehensive alchemical dictionary with scholarly notes and hierarchical lists."
                .to_string(),
            record_count: 0,
            symbol_count: 0,
        },
    );
    catalog.insert(
        Source::Sommerhoff,
        CollectionMetadata {
            title: "Lexicon pharmaceutico-chymicum Latino-Germanicum et Germanico-Latinum".to_string(),
            author: "Johann Christoph Sommerhoff".to_string(),
            year: 1701,
            language: "Bilingual Latin-German".to_string(),
            description: "A bilingual dictionary covering pharmaceutical, alchemical, and botanical terms with extensive symbol usage."
                .to_string(),
            record_count: 0,
            symbol_count: 0,
        },
    );
    catalog
});

/// Per-collection overrides of the built-in metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataOverride {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<u16>,
    pub language: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extraction threads per collection (0 = one per CPU)
    pub threads: usize,
    pub show_progress: bool,
    /// Phrases that introduce a textual cross-reference
    pub reference_markers: Vec<String>,
    /// Longest candidate term, in words, taken after a marker
    pub max_reference_words: usize,
    pub collections: BTreeMap<Source, MetadataOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            threads: 0,
            show_progress: true,
            reference_markers: ["vide", "vid.", "siehe", "see", "cf."]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_reference_words: 4,
            collections: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|source| ConvertError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_yaml(&contents).map_err(|message| ConvertError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_yaml(contents: &str) -> std::result::Result<Config, String> {
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(contents).map_err(|e| e.to_string())?;
        if config.max_reference_words == 0 {
            return Err("max_reference_words must be at least 1".to_string());
        }
        Ok(config)
    }

    /// Worker threads to use, resolving 0 to the available parallelism.
    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4)
    }

    pub fn scanner(&self) -> Result<ReferenceScanner> {
        ReferenceScanner::new(self.reference_markers.as_slice(), self.max_reference_words)
    }

    /// Built-in metadata of `source` with any configured overrides applied.
    pub fn metadata(&self, source: Source) -> CollectionMetadata {
        let mut meta = CATALOG
            .get(&source)
            .cloned()
            .unwrap_or_else(|| CollectionMetadata {
                title: source.to_string(),
                author: String::new(),
                year: 0,
                language: String::new(),
                description: String::new(),
                record_count: 0,
                symbol_count: 0,
            });
        if let Some(o) = self.collections.get(&source) {
            if let Some(title) = &o.title {
                meta.title = title.clone();
            }
            if let Some(author) = &o.author {
                meta.author = author.clone();
            }
            if let Some(year) = o.year {
                meta.year = year;
            }
            if let Some(language) = &o.language {
                meta.language = language.clone();
            }
            if let Some(description) = &o.description {
                meta.description = description.clone();
            }
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(Config::default().max_reference_words, 4);
        assert!(Config::default().reference_markers.contains(&"vid.".to_string()));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_yaml("threads: 2\nmax_reference_words: 3\n").unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.thread_count(), 2);
        assert_eq!(config.max_reference_words, 3);
        assert!(config.show_progress);
        assert_eq!(config.reference_markers, Config::default().reference_markers);
    }

    #[test]
    fn zero_reference_words_is_rejected() {
        assert!(Config::from_yaml("max_reference_words: 0").is_err());
    }

    #[test]
    fn unknown_collection_is_rejected() {
        assert!(Config::from_yaml("collections:\n  paracelsus:\n    year: 1530\n").is_err());
    }

    #[test]
    fn metadata_overrides_apply_per_collection() {
        let config = Config::from_yaml(
            "collections:\n  ruland:\n    title: Lexicon Alchemiae sive Dictionarium\n    year: 1661\n",
        )
        .unwrap();
        let ruland = config.metadata(Source::Ruland);
        assert_eq!(ruland.title, "Lexicon Alchemiae sive Dictionarium");
        assert_eq!(ruland.year, 1661);
        assert_eq!(ruland.author, "Martin Ruland the Younger");
        assert_eq!(config.metadata(Source::Sommerhoff).year, 1701);
    }

    #[test]
    fn load_reports_path_on_bad_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads: [oops").unwrap();
        match Config::load(file.path()) {
            Err(ConvertError::Config { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn auto_thread_count_is_positive() {
        assert!(Config::default().thread_count() >= 1);
    }
}
