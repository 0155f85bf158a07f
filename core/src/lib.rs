//! Review search core: text normalization, the inverted index over a review
//! corpus, boolean and lexicon-filtered queries, and embedding search.

pub mod boolean;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod lexicon;
pub mod persist;
pub mod tokenizer;

pub use boolean::{boolean_search, BooleanQuery, Hit, Method};
pub use config::{Config, SearchConfig, TextConfig};
pub use embedding::{embedding_search, EmbeddingQuery, EmbeddingRegistry, EmbeddingTable, ScoredHit};
pub use error::{Error, Result};
pub use index::{DocId, IndexBuilder, InvertedIndex, RawReview, Review};
pub use lexicon::{boolean_and_rating_search, OpinionLexicon, Polarity, RatedHit};
pub use tokenizer::{Normalizer, StopwordSet};
