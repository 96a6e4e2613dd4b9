//! Per-letter partitions of a collection.

use crate::model::{LetterBucket, LetterIndex, Record, Source};
use std::collections::BTreeMap;

/// Build the master letter index. Every letter A-Z is present, and letters
/// outside that range get entries of their own. Ids keep input order.
pub fn build_letter_index(source: Source, records: &[Record]) -> LetterIndex {
    let mut letters: BTreeMap<String, LetterBucket> = ('A'..='Z')
        .map(|c| {
            (
                c.to_string(),
                LetterBucket {
                    count: 0,
                    entries: Vec::new(),
                },
            )
        })
        .collect();

    let mut unindexed = 0;
    for record in records {
        match &record.letter {
            Some(letter) => {
                let bucket = letters.entry(letter.clone()).or_insert_with(|| LetterBucket {
                    count: 0,
                    entries: Vec::new(),
                });
                bucket.count += 1;
                bucket.entries.push(record.id.clone());
            }
            None => unindexed += 1,
        }
    }

    LetterIndex {
        source,
        letters,
        total_entries: records.len(),
        unindexed,
    }
}

/// Full records for each letter of `index`, in index order.
pub fn partition<'a>(index: &LetterIndex, records: &'a [Record]) -> BTreeMap<String, Vec<&'a Record>> {
    let mut parts: BTreeMap<String, Vec<&Record>> = index
        .letters
        .keys()
        .map(|letter| (letter.clone(), Vec::new()))
        .collect();
    for record in records {
        if let Some(part) = record.letter.as_ref().and_then(|l| parts.get_mut(l)) {
            part.push(record);
        }
    }
    parts
}

/// File name stem for a letter partition: ASCII letters lower-cased, any
/// other letter spelled as its code point so the name stays portable.
pub fn letter_slug(letter: &str) -> String {
    if letter.chars().all(|c| c.is_ascii_alphabetic()) {
        letter.to_ascii_lowercase()
    } else {
        letter
            .chars()
            .map(|c| format!("u{:04x}", c as u32))
            .collect::<Vec<_>>()
            .join("_")
    }
}
