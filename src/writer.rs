//! Artifact serialization.
//!
//! All artifacts are pretty-printed UTF-8 JSON. Nothing time-dependent is
//! written, so converting unchanged input reproduces the same bytes.

use crate::error::{ConvertError, Result};
use crate::letters::{letter_slug, partition};
use crate::model::{CollectionMetadata, Source};
use crate::pipeline::{ArtifactSet, Collection, CollectionStats, Failure};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONVERTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct MetadataFile<'a> {
    version: &'static str,
    collections: BTreeMap<Source, &'a CollectionMetadata>,
}

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    source: Source,
    #[serde(flatten)]
    stats: &'a CollectionStats,
}

#[derive(Debug, Serialize)]
struct ConversionReport<'a> {
    version: &'static str,
    collections: Vec<ReportEntry<'a>>,
    reference_edges: usize,
    resolved_edges: usize,
    ambiguous_matches: usize,
    failures: &'a [Failure],
}

pub struct ArtifactWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl ArtifactWriter {
    /// Prepare `dir`, creating it if needed.
    pub fn create(dir: &Path) -> Result<ArtifactWriter> {
        fs::create_dir_all(dir).map_err(|source| ConvertError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(ArtifactWriter {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        })
    }

    pub fn write_json<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let write_err = |source| ConvertError::Write {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(write_err)?;
        let mut writer = BufWriter::with_capacity(256 * 1024, file);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| {
            if e.is_io() {
                write_err(e.into())
            } else {
                ConvertError::Serialize(e)
            }
        })?;
        writer.write_all(b"\n").map_err(write_err)?;
        writer.flush().map_err(write_err)?;
        debug!("Wrote {}", path.display());
        self.written.push(path.clone());
        Ok(path)
    }

    pub fn write_collection(&mut self, c: &Collection) -> Result<()> {
        let s = c.source.as_str();
        self.write_json(&format!("{s}_dictionary.json"), &c.records)?;
        for (letter, records) in partition(&c.letter_index, &c.records) {
            self.write_json(&format!("{s}_index_{}.json", letter_slug(&letter)), &records)?;
        }
        self.write_json(&format!("{s}_letter_index.json"), &c.letter_index)?;
        self.write_json(&format!("{s}_search_index.json"), &c.search_index)?;
        self.write_json(&format!("{s}_symbols.json"), c.symbols.symbols())?;
        Ok(())
    }

    /// Write per-collection artifacts, then the shared ones.
    pub fn write_all(&mut self, set: &ArtifactSet) -> Result<()> {
        for c in &set.collections {
            self.write_collection(c)?;
        }
        self.write_json("reference_graph.json", &set.graph.edges)?;

        let metadata = MetadataFile {
            version: CONVERTER_VERSION,
            collections: set.collections.iter().map(|c| (c.source, &c.metadata)).collect(),
        };
        self.write_json("dictionary_metadata.json", &metadata)?;
        self.write_report(set)
    }

    /// The conversion report alone; it is written even when every
    /// collection failed.
    pub fn write_report(&mut self, set: &ArtifactSet) -> Result<()> {
        let report = ConversionReport {
            version: CONVERTER_VERSION,
            collections: set
                .collections
                .iter()
                .map(|c| ReportEntry {
                    source: c.source,
                    stats: &c.stats,
                })
                .collect(),
            reference_edges: set.graph.edges.len(),
            resolved_edges: set.graph.edges.iter().filter(|e| e.target_id.is_some()).count(),
            ambiguous_matches: set.graph.ambiguous,
            failures: &set.failures,
        };
        self.write_json("conversion_report.json", &report)?;
        Ok(())
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }
}
