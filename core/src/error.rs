//! Error types for index construction and query evaluation.

use thiserror::Error;

/// Errors raised by the review search core.
///
/// Per-record data problems (an unparseable rating, a token with no
/// embedding, a term missing from the index) never show up here; they are
/// skipped where they occur.
#[derive(Error, Debug)]
pub enum Error {
    /// Method tag other than `method1`, `method2` or `method3`.
    #[error("invalid method {method:?}: choose method1, method2 or method3")]
    InvalidMethod { method: String },

    /// A corpus record lacks one of the fields every review must carry.
    #[error("record {record} is missing required field `{field}`")]
    MissingRequiredField { field: &'static str, record: usize },

    /// Two corpus records share a review id.
    #[error("duplicate review id {review_id:?}")]
    DuplicateReviewId { review_id: String },

    /// None of the aspect (or opinion) terms has an embedding.
    #[error("no {role} term has an embedding: {terms:?}")]
    NoEmbeddingMatch { role: &'static str, terms: Vec<String> },

    #[error("embedding for {term:?} has dimension {found}, table dimension is {expected}")]
    DimensionMismatch { term: String, expected: usize, found: usize },

    #[error("malformed embedding at line {line}: {reason}")]
    EmbeddingParse { line: usize, reason: String },

    #[error("unknown embedding method {name:?}")]
    UnknownEmbeddingMethod { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
