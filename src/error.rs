//! Error types for the TEI conversion pipeline.
//!
//! Only problems that make a whole collection unusable are errors. Issues with
//! individual articles (missing headword, undeclared symbol, dangling
//! reference, duplicate id) are recorded in the collection statistics instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The source document could not be opened or read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source document is not well-formed markup.
    #[error("malformed markup in {path:?} at byte {position}: {message}")]
    Xml {
        path: PathBuf,
        position: usize,
        message: String,
    },

    /// The document parsed, but it is not a TEI document.
    #[error("{path:?} is not a TEI document (root element <{found}>)")]
    UnexpectedRoot { path: PathBuf, found: String },

    /// The configuration file could not be loaded.
    #[error("invalid configuration {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    /// An artifact could not be written.
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured reference marker produced an unusable pattern.
    #[error("invalid reference marker pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
