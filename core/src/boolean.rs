use crate::error::{Error, Result};
use crate::index::{DocId, InvertedIndex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How the postings of the query terms are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `method1`: any term matches.
    Or,
    /// `method2`: every term matches.
    And,
    /// `method3`: an aspect matches and an opinion matches.
    OrThenAnd,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Or, Method::And, Method::OrThenAnd];

    pub fn tag(self) -> &'static str {
        match self {
            Method::Or => "method1",
            Method::And => "method2",
            Method::OrThenAnd => "method3",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Only the exact tags are accepted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "method1" => Ok(Method::Or),
            "method2" => Ok(Method::And),
            "method3" => Ok(Method::OrThenAnd),
            _ => Err(Error::InvalidMethod { method: s.to_string() }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Two aspect terms, one or two opinion terms and a combination method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanQuery {
    pub aspect1: String,
    pub aspect2: String,
    pub opinion1: String,
    pub opinion2: Option<String>,
    pub method: Method,
}

impl BooleanQuery {
    pub fn new(aspect1: &str, aspect2: &str, opinion1: &str, method: Method) -> Self {
        Self {
            aspect1: clean_term(aspect1),
            aspect2: clean_term(aspect2),
            opinion1: clean_term(opinion1),
            opinion2: None,
            method,
        }
    }

    /// Set the optional second opinion; a blank term leaves it unset.
    pub fn with_second_opinion(mut self, opinion2: Option<&str>) -> Self {
        self.opinion2 = opinion2.map(clean_term).filter(|t| !t.is_empty());
        self
    }

    pub fn opinions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.opinion1.as_str()).chain(self.opinion2.as_deref())
    }
}

/// Query words as the user gave them, trimmed and lowercased. Mapping to
/// index-term form happens at lookup, under the index's own text settings,
/// so the lexicon still sees the surface word.
pub(crate) fn clean_term(term: &str) -> String {
    term.trim().to_lowercase()
}

/// A matching review and its rating as stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Hit {
    pub review_id: String,
    pub rating: String,
}

fn posting_set(index: &InvertedIndex, term: &str) -> BTreeSet<DocId> {
    index.term_postings(term).iter().copied().collect()
}

/// Documents matching `query`, as a set of doc ids.
pub fn matching_docs(index: &InvertedIndex, query: &BooleanQuery) -> BTreeSet<DocId> {
    let a1 = posting_set(index, &query.aspect1);
    let a2 = posting_set(index, &query.aspect2);
    let o1 = posting_set(index, &query.opinion1);
    let o2 = query.opinion2.as_deref().map(|t| posting_set(index, t));

    match query.method {
        Method::Or => {
            let mut docs = &(&a1 | &a2) | &o1;
            if let Some(o2) = o2 {
                docs.extend(o2);
            }
            docs
        }
        Method::And => {
            let docs = &(&a1 & &a2) & &o1;
            match o2 {
                Some(o2) => &docs & &o2,
                None => docs,
            }
        }
        Method::OrThenAnd => {
            let aspects = &a1 | &a2;
            let mut docs = &aspects & &o1;
            if let Some(o2) = o2 {
                docs.extend(aspects.intersection(&o2).copied());
            }
            docs
        }
    }
}

/// Evaluate a boolean query. Hits are unranked and come back in corpus
/// order, one per review.
pub fn boolean_search(index: &InvertedIndex, query: &BooleanQuery) -> Vec<Hit> {
    let hits: Vec<Hit> = matching_docs(index, query)
        .into_iter()
        .filter_map(|id| index.review(id))
        .map(|r| Hit { review_id: r.review_id.clone(), rating: r.rating.clone() })
        .collect();
    tracing::debug!(method = %query.method, hits = hits.len(), "boolean search");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::RawReview;
    use crate::tokenizer::Normalizer;

    fn index() -> InvertedIndex {
        let docs = vec![
            RawReview::new("1", 5, "great battery life"),
            RawReview::new("2", 1, "bad battery"),
            RawReview::new("3", 4, "great screen"),
            RawReview::new("4", 2, "screen is bad and the battery is bad"),
        ];
        InvertedIndex::build(&Normalizer::default_config(), docs).unwrap()
    }

    fn ids(hits: &[Hit]) -> Vec<&str> {
        hits.iter().map(|h| h.review_id.as_str()).collect()
    }

    #[test]
    fn parses_method_tags() {
        assert_eq!("method1".parse::<Method>().unwrap(), Method::Or);
        assert_eq!("method2".parse::<Method>().unwrap(), Method::And);
        assert_eq!("method3".parse::<Method>().unwrap(), Method::OrThenAnd);
        let err = "method4".parse::<Method>().unwrap_err();
        assert!(matches!(err, Error::InvalidMethod { ref method } if method == "method4"));
    }

    #[test]
    fn method_tags_must_match_exactly() {
        for tag in ["METHOD2", " method2", "method2 ", "Method1", ""] {
            assert!(tag.parse::<Method>().is_err(), "{tag:?}");
        }
    }

    #[test]
    fn plural_query_words_match_singular_terms() {
        let q = BooleanQuery::new("Batteries", "screens", "great", Method::OrThenAnd);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1", "3"]);
    }

    #[test]
    fn stemming_index_is_queried_with_plain_words() {
        let cfg = crate::config::TextConfig { stemming: true, ..Default::default() };
        let normalizer = Normalizer::new(cfg, crate::tokenizer::StopwordSet::new());
        let docs = vec![RawReview::new("1", 5, "great battery life"), RawReview::new("2", 1, "bad battery")];
        let index = InvertedIndex::build(&normalizer, docs).unwrap();
        let q = BooleanQuery::new("battery", "battery", "great", Method::And);
        assert_eq!(ids(&boolean_search(&index, &q)), vec!["1"]);
    }

    #[test]
    fn or_unions_every_term() {
        let q = BooleanQuery::new("battery", "battery", "bad", Method::Or);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1", "2", "4"]);
        let q = BooleanQuery::new("battery", "screen", "nothing", Method::Or);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn and_requires_every_term() {
        let q = BooleanQuery::new("battery", "battery", "great", Method::And);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1"]);
        let q = BooleanQuery::new("battery", "screen", "bad", Method::And);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["4"]);
        let q = q.with_second_opinion(Some("great"));
        assert!(boolean_search(&index(), &q).is_empty());
    }

    #[test]
    fn unknown_term_collapses_and() {
        let q = BooleanQuery::new("battery", "missing", "bad", Method::And);
        assert!(boolean_search(&index(), &q).is_empty());
    }

    #[test]
    fn grouped_gates_each_opinion_by_aspects() {
        let q = BooleanQuery::new("battery", "battery", "great", Method::OrThenAnd);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1"]);
        let q = q.with_second_opinion(Some("bad"));
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1", "2", "4"]);
        // doc 3 has "great" but no battery
        let q = BooleanQuery::new("battery", "life", "great", Method::OrThenAnd);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1"]);
    }

    #[test]
    fn query_terms_are_lowercased_and_blank_opinion_ignored() {
        let q = BooleanQuery::new(" Battery ", "BATTERY", "Great", Method::And).with_second_opinion(Some("  "));
        assert_eq!(q.opinion2, None);
        assert_eq!(ids(&boolean_search(&index(), &q)), vec!["1"]);
    }

    #[test]
    fn hits_carry_ratings() {
        let q = BooleanQuery::new("screen", "screen", "great", Method::And);
        assert_eq!(boolean_search(&index(), &q), vec![Hit { review_id: "3".into(), rating: "4".into() }]);
    }
}
