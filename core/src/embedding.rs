//! Embedding search: mean word vectors for the query and for each candidate
//! review, compared by cosine similarity.

use crate::boolean::{clean_term, Method};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::index::{InvertedIndex, Review};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;

/// Term to vector table. Every vector has the same dimension.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingTable {
    pub fn new() -> Self { Self::default() }

    /// Add a vector. The first insert fixes the table dimension; a vector of
    /// any other length is rejected.
    pub fn insert(&mut self, term: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        let term = term.into();
        let expected = if self.vectors.is_empty() { vector.len() } else { self.dim };
        if vector.is_empty() || vector.len() != expected {
            return Err(Error::DimensionMismatch { term, expected: self.dim, found: vector.len() });
        }
        self.dim = expected;
        self.vectors.insert(term, vector);
        Ok(())
    }

    /// Parse GloVe text format: a term followed by its components on each
    /// line. Blank lines are skipped; when a term repeats, the first vector
    /// is kept.
    pub fn from_glove_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let Some(term) = parts.next() else { continue };
            let vector = parts
                .map(|p| p.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| Error::EmbeddingParse { line: i + 1, reason: e.to_string() })?;
            if vector.is_empty() {
                return Err(Error::EmbeddingParse { line: i + 1, reason: format!("no components for {term:?}") });
            }
            if table.contains(term) { continue; }
            table.insert(term, vector)?;
        }
        tracing::info!(terms = table.len(), dim = table.dim(), "loaded embedding table");
        Ok(table)
    }

    pub fn get(&self, term: &str) -> Option<&[f32]> {
        self.vectors.get(term).map(Vec::as_slice)
    }

    pub fn contains(&self, term: &str) -> bool { self.vectors.contains_key(term) }

    pub fn dim(&self) -> usize { self.dim }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }
}

/// Embedding tables by selector name, e.g. `glove`.
#[derive(Debug, Default)]
pub struct EmbeddingRegistry {
    tables: HashMap<String, EmbeddingTable>,
}

impl EmbeddingRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: &str, table: EmbeddingTable) {
        self.tables.insert(name.trim().to_lowercase(), table);
    }

    pub fn get(&self, name: &str) -> Result<&EmbeddingTable> {
        self.tables
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| Error::UnknownEmbeddingMethod { name: name.to_string() })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool { self.tables.is_empty() }
}

/// Element-wise mean, or `None` when there are no vectors.
pub fn mean_vector<'a, I>(vectors: I, dim: usize) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;
    for v in vectors {
        for (s, x) in sum.iter_mut().zip(v) {
            *s += x;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f32;
    sum.iter_mut().for_each(|s| *s /= n);
    Some(sum)
}

/// Cosine similarity in [-1, 1]. A zero vector is similar to nothing (0.0).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Combine the aspect and opinion similarities of one review.
pub fn combine_scores(method: Method, aspect: f32, opinion: f32) -> f32 {
    let (hi, lo) = (aspect.max(opinion), aspect.min(opinion));
    match method {
        Method::Or => hi,
        Method::And => lo,
        Method::OrThenAnd => 0.5 * hi + 0.5 * lo,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingQuery {
    pub aspects: Vec<String>,
    pub opinions: Vec<String>,
    pub method: Method,
    pub threshold: f32,
}

impl EmbeddingQuery {
    /// Terms are trimmed and lowercased; blank terms are dropped.
    pub fn new<A, O>(aspects: A, opinions: O, method: Method) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        O: IntoIterator,
        O::Item: AsRef<str>,
    {
        Self {
            aspects: clean_terms(aspects),
            opinions: clean_terms(opinions),
            method,
            threshold: SearchConfig::default().threshold,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

fn clean_terms<I>(terms: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    terms.into_iter().map(|t| clean_term(t.as_ref())).filter(|t| !t.is_empty()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredHit {
    pub review_id: String,
    pub score: f32,
}

fn query_vector(table: &EmbeddingTable, terms: &[String], role: &'static str) -> Result<Vec<f32>> {
    mean_vector(terms.iter().filter_map(|t| table.get(t)), table.dim())
        .ok_or_else(|| Error::NoEmbeddingMatch { role, terms: terms.to_vec() })
}

/// Reviews containing any query term, deduplicated by review id with the
/// first occurrence kept. Terms are looked up in index-term form; the
/// embedding table is keyed by surface words.
fn candidates<'a>(index: &'a InvertedIndex, query: &EmbeddingQuery) -> Vec<&'a Review> {
    let mut seen = HashSet::new();
    query
        .aspects
        .iter()
        .chain(&query.opinions)
        .flat_map(|term| index.term_postings(term))
        .filter_map(|&doc| index.review(doc))
        .filter(|review| seen.insert(review.review_id.as_str()))
        .collect()
}

/// Sort by score descending, equal scores by review id ascending.
fn rank_hits(hits: &mut [ScoredHit]) {
    for hit in hits.iter_mut() {
        // -0.0 + 0.0 == +0.0, so zero scores compare equal under total_cmp
        hit.score += 0.0;
    }
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.review_id.cmp(&b.review_id)));
}

/// Score the reviews that contain a query term against the mean aspect and
/// mean opinion vectors. Hits at or above the threshold come back by score
/// descending, equal scores by review id ascending.
pub fn embedding_search(index: &InvertedIndex, table: &EmbeddingTable, query: &EmbeddingQuery) -> Result<Vec<ScoredHit>> {
    let aspect_vec = query_vector(table, &query.aspects, "aspect")?;
    let opinion_vec = query_vector(table, &query.opinions, "opinion")?;

    let candidates = candidates(index, query);
    let mut unscoreable = 0usize;
    let mut hits = Vec::new();
    for review in &candidates {
        let tokens = review.text.split_whitespace().filter_map(|t| table.get(t));
        let Some(doc_vec) = mean_vector(tokens, table.dim()) else {
            unscoreable += 1;
            continue;
        };
        let aspect = cosine_similarity(&doc_vec, &aspect_vec);
        let opinion = cosine_similarity(&doc_vec, &opinion_vec);
        let score = combine_scores(query.method, aspect, opinion);
        if score >= query.threshold {
            hits.push(ScoredHit { review_id: review.review_id.clone(), score });
        }
    }
    rank_hits(&mut hits);

    tracing::debug!(
        method = %query.method,
        candidates = candidates.len(),
        unscoreable,
        hits = hits.len(),
        "embedding search"
    );
    Ok(hits)
}
