use crate::config::TextConfig;
use crate::error::{Error, Result};
use crate::tokenizer::{query_term, Normalizer};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

pub type DocId = u32;

/// A corpus record as it arrives from the loader. Every field is optional
/// here so that a missing one can be reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReview {
    #[serde(default, deserialize_with = "string_or_number")]
    pub review_id: Option<String>,
    #[serde(default)]
    pub review_text: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub customer_review_rating: Option<String>,
}

impl RawReview {
    pub fn new(review_id: impl Into<String>, rating: impl ToString, text: impl Into<String>) -> Self {
        Self {
            review_id: Some(review_id.into()),
            review_text: Some(text.into()),
            customer_review_rating: Some(rating.to_string()),
        }
    }
}

/// A review stored in the index. The rating keeps its source form and is
/// parsed only where a filter needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub rating: String,
    pub text: String,
}

impl Review {
    /// Integer rating, or `None` when the stored value is not one.
    /// `"4"`, `" 4 "` and `"4.0"` all give 4.
    pub fn rating_value(&self) -> Option<i64> {
        parse_rating(&self.rating)
    }
}

/// Parse a stored rating as an integer. Float spellings of whole numbers
/// are accepted, anything else is `None`.
pub fn parse_rating(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// Term to postings mapping over an immutable review table.
///
/// A document appears at most once in a term's postings, however often the
/// term occurs in its text. Postings are sorted by `DocId`, which is the
/// position of the review in the corpus.
///
/// The index keeps the `TextConfig` its terms were produced with, so query
/// words are lemmatized (or stemmed) the same way before lookup.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<DocId>>,
    reviews: Vec<Review>,
    by_review_id: HashMap<String, DocId>,
    text: TextConfig,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Build an index from a whole corpus, aborting on the first bad record.
    pub fn build<I>(normalizer: &Normalizer, docs: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawReview>,
    {
        let mut builder = IndexBuilder::new(normalizer);
        for doc in docs {
            builder.add(doc)?;
        }
        Ok(builder.finish())
    }

    /// Postings for `term`; an unknown term has none.
    pub fn postings(&self, term: &str) -> &[DocId] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Postings for a query word, after mapping it to index-term form.
    pub fn term_postings(&self, word: &str) -> &[DocId] {
        self.postings(&query_term(&self.text, word))
    }

    pub fn doc_freq(&self, term: &str) -> usize { self.postings(term).len() }

    pub fn text_config(&self) -> &TextConfig { &self.text }

    pub fn review(&self, doc_id: DocId) -> Option<&Review> {
        self.reviews.get(doc_id as usize)
    }

    pub fn review_by_id(&self, review_id: &str) -> Option<&Review> {
        self.by_review_id.get(review_id).and_then(|&id| self.review(id))
    }

    pub fn reviews(&self) -> &[Review] { &self.reviews }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }

    pub fn num_docs(&self) -> usize { self.reviews.len() }

    pub fn num_terms(&self) -> usize { self.postings.len() }
}

/// Accumulates reviews into an `InvertedIndex`, one record at a time.
pub struct IndexBuilder<'a> {
    normalizer: &'a Normalizer,
    index: InvertedIndex,
    records: usize,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(normalizer: &'a Normalizer) -> Self {
        let index = InvertedIndex { text: normalizer.config().clone(), ..InvertedIndex::default() };
        Self { normalizer, index, records: 0 }
    }

    /// Normalize one review and add its postings.
    pub fn add(&mut self, raw: RawReview) -> Result<DocId> {
        let record = self.records;
        self.records += 1;

        let review_id = raw
            .review_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(Error::MissingRequiredField { field: "review_id", record })?;
        let text = raw.review_text.ok_or(Error::MissingRequiredField { field: "review_text", record })?;
        let rating = raw
            .customer_review_rating
            .ok_or(Error::MissingRequiredField { field: "customer_review_rating", record })?;
        if self.index.by_review_id.contains_key(&review_id) {
            return Err(Error::DuplicateReviewId { review_id });
        }

        let doc_id = self.index.reviews.len() as DocId;
        for term in self.normalizer.normalize(&text) {
            let plist = self.index.postings.entry(term).or_default();
            // doc ids only grow, so a repeat can only be the last entry
            if plist.last() != Some(&doc_id) {
                plist.push(doc_id);
            }
        }
        self.index.by_review_id.insert(review_id.clone(), doc_id);
        self.index.reviews.push(Review { review_id, rating, text });
        Ok(doc_id)
    }

    pub fn num_docs(&self) -> usize { self.index.num_docs() }

    pub fn finish(self) -> InvertedIndex {
        tracing::info!(num_docs = self.index.num_docs(), num_terms = self.index.num_terms(), "built inverted index");
        self.index
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<RawReview> {
        vec![
            RawReview::new("1", 5, "great battery life"),
            RawReview::new("2", 1, "bad battery"),
        ]
    }

    #[test]
    fn builds_postings_per_term() {
        let index = InvertedIndex::build(&Normalizer::default_config(), corpus()).unwrap();
        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.postings("battery"), &[0, 1]);
        assert_eq!(index.postings("great"), &[0]);
        assert_eq!(index.postings("bad"), &[1]);
        assert!(index.postings("screen").is_empty());
        assert_eq!(index.review_by_id("2").unwrap().text, "bad battery");
    }

    #[test]
    fn stemming_index_answers_plain_query_words() {
        let normalizer = Normalizer::new(
            TextConfig { stemming: true, ..TextConfig::default() },
            crate::tokenizer::StopwordSet::new(),
        );
        let index = InvertedIndex::build(&normalizer, corpus()).unwrap();
        assert!(index.postings("battery").is_empty());
        assert_eq!(index.term_postings("battery"), &[0, 1]);
        assert_eq!(index.term_postings("Batteries"), &[0, 1]);
        assert!(index.text_config().stemming);
    }

    #[test]
    fn repeated_term_collapses_to_one_posting() {
        let docs = vec![RawReview::new("a", 4, "battery battery Batteries")];
        let index = InvertedIndex::build(&Normalizer::default_config(), docs).unwrap();
        assert_eq!(index.postings("battery"), &[0]);
        assert_eq!(index.doc_freq("battery"), 1);
    }

    #[test]
    fn missing_field_aborts_build() {
        let mut docs = corpus();
        docs.push(RawReview { review_id: Some("3".into()), review_text: Some("ok".into()), customer_review_rating: None });
        let err = InvertedIndex::build(&Normalizer::default_config(), docs).unwrap_err();
        match err {
            Error::MissingRequiredField { field, record } => {
                assert_eq!(field, "customer_review_rating");
                assert_eq!(record, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_review_id_counts_as_missing() {
        let docs = vec![RawReview::new("  ", 3, "fine")];
        let err = InvertedIndex::build(&Normalizer::default_config(), docs).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { field: "review_id", record: 0 }));
    }

    #[test]
    fn duplicate_review_id_aborts_build() {
        let docs = vec![RawReview::new("1", 5, "good"), RawReview::new("1", 2, "bad")];
        let err = InvertedIndex::build(&Normalizer::default_config(), docs).unwrap_err();
        assert!(matches!(err, Error::DuplicateReviewId { .. }));
    }

    #[test]
    fn raw_review_accepts_numeric_fields() {
        let raw: RawReview = serde_json::from_str(
            r#"{"review_id": 17, "review_text": "fine", "customer_review_rating": 4}"#,
        )
        .unwrap();
        assert_eq!(raw.review_id.as_deref(), Some("17"));
        assert_eq!(raw.customer_review_rating.as_deref(), Some("4"));

        let missing: RawReview = serde_json::from_str(r#"{"review_id": "x"}"#).unwrap();
        assert!(missing.review_text.is_none());
        assert!(missing.customer_review_rating.is_none());
    }

    #[test]
    fn rating_values() {
        let mut review = Review { review_id: "r".into(), rating: " 4 ".into(), text: String::new() };
        assert_eq!(review.rating_value(), Some(4));
        review.rating = "4.0".into();
        assert_eq!(review.rating_value(), Some(4));
        review.rating = "4.5".into();
        assert_eq!(review.rating_value(), None);
        review.rating = "five".into();
        assert_eq!(review.rating_value(), None);
    }
}
