//! Conversion of the Ruland and Sommerhoff TEI dictionaries into normalized,
//! indexed JSON records.
//!
//! [`pipeline::run`] takes the two document paths and an output directory;
//! [`pipeline::convert`] does the same work without writing anything.

pub mod config;
pub mod error;
pub mod extract;
pub mod ids;
pub mod letters;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod search;
pub mod symbols;
pub mod tei;
pub mod writer;
pub mod xref;

pub use config::Config;
pub use error::{ConvertError, Result};
pub use model::{Record, ReferenceEdge, Source, Symbol};
pub use normalize::normalize_lemma;
pub use pipeline::{convert, run, ArtifactSet};
