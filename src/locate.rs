//! Discovery of source documents when no explicit paths are given.

use crate::model::Source;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories searched, relative to the base directory.
const SEARCH_DIRS: &[&str] = &[".", "..", "tei", "data"];

/// Subdirectory name fragments worth descending into.
const SUBDIR_HINTS: &[&str] = &["ruland", "sommerhoff", "tei", "data"];

fn name_prefixes(source: Source) -> &'static [&'static str] {
    match source {
        Source::Ruland => &["ruland"],
        Source::Sommerhoff => &["sommerhoff", "lexikon_sommerhoff"],
    }
}

/// Whether `file_name` looks like a document of `source`.
pub fn matches_source(source: Source, file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    let is_xml = lower.ends_with(".xml") || lower.ends_with(".xml.bz2");
    is_xml && name_prefixes(source).iter().any(|p| lower.starts_with(p))
}

/// The most complete (largest) candidate document for `source` under `base`.
pub fn find_source(base: &Path, source: Source) -> Option<PathBuf> {
    let mut best: Option<(u64, PathBuf)> = None;
    for dir in candidate_dirs(base) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !matches_source(source, name) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            debug!("{} candidate {} ({} bytes)", source, path.display(), meta.len());
            let better = match &best {
                Some((size, current)) => meta.len() > *size || (meta.len() == *size && path < *current),
                None => true,
            };
            if better {
                best = Some((meta.len(), path));
            }
        }
    }
    best.map(|(_, path)| path)
}

fn candidate_dirs(base: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for rel in SEARCH_DIRS {
        let dir = base.join(rel);
        if !dir.is_dir() {
            continue;
        }
        if let Ok(entries) = fs::read_dir(&dir) {
            let mut subdirs: Vec<PathBuf> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.to_lowercase())
                        .is_some_and(|n| SUBDIR_HINTS.iter().any(|h| n.contains(h)))
                })
                .collect();
            subdirs.sort();
            dirs.push(dir);
            dirs.extend(subdirs);
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_patterns() {
        assert!(matches_source(Source::Ruland, "Ruland.xml"));
        assert!(matches_source(Source::Ruland, "ruland_1612.xml.bz2"));
        assert!(matches_source(Source::Sommerhoff, "Lexikon_Sommerhoff.xml"));
        assert!(matches_source(Source::Sommerhoff, "Sommerhoff-full.XML"));
        assert!(!matches_source(Source::Ruland, "Ruland.json"));
        assert!(!matches_source(Source::Ruland, "Sommerhoff.xml"));
    }

    #[test]
    fn largest_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Ruland_sample.xml"), "<TEI/>").unwrap();
        fs::create_dir(dir.path().join("tei")).unwrap();
        fs::write(dir.path().join("tei").join("Ruland.xml"), "<TEI><text/></TEI>").unwrap();
        fs::create_dir(dir.path().join("sommerhoff-data")).unwrap();
        fs::write(
            dir.path().join("sommerhoff-data").join("Lexikon_Sommerhoff.xml"),
            "<TEI/>",
        )
        .unwrap();

        assert_eq!(
            find_source(dir.path(), Source::Ruland),
            Some(dir.path().join("tei").join("Ruland.xml"))
        );
        assert_eq!(
            find_source(dir.path(), Source::Sommerhoff),
            Some(dir.path().join("sommerhoff-data").join("Lexikon_Sommerhoff.xml"))
        );
    }

    #[test]
    fn nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        assert_eq!(find_source(&empty, Source::Ruland), None);
    }
}
