//! Opinion lexicon and the rating filter chained after boolean search.

use crate::boolean::{boolean_search, BooleanQuery, Hit};
use crate::index::{parse_rating, InvertedIndex};
use serde::Serialize;
use std::collections::HashSet;
use std::io::BufRead;

/// Highest rating still counted as negative.
pub const NEGATIVE_MAX_RATING: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Unknown,
}

impl Polarity {
    /// Whether a review with `rating` agrees with this polarity.
    /// `Unknown` agrees with nothing.
    pub fn admits(self, rating: i64) -> bool {
        match self {
            Polarity::Positive => rating > NEGATIVE_MAX_RATING,
            Polarity::Negative => rating <= NEGATIVE_MAX_RATING,
            Polarity::Unknown => false,
        }
    }
}

/// A filtered hit with its rating parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RatedHit {
    pub review_id: String,
    pub rating: i64,
}

/// Positive and negative opinion words, lowercase.
///
/// A word listed in both sets is classified positive.
#[derive(Debug, Clone, Default)]
pub struct OpinionLexicon {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

impl OpinionLexicon {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let positive: HashSet<String> = positive.into_iter().map(|w| w.as_ref().trim().to_lowercase()).collect();
        let negative: HashSet<String> = negative.into_iter().map(|w| w.as_ref().trim().to_lowercase()).collect();
        let overlap = positive.intersection(&negative).count();
        if overlap > 0 {
            tracing::warn!(overlap, "opinion words listed as both positive and negative; treating them as positive");
        }
        Self { positive, negative }
    }

    /// Load both lists from newline-delimited word files.
    pub fn from_readers<P: BufRead, N: BufRead>(positive: P, negative: N) -> std::io::Result<Self> {
        Ok(Self::new(read_word_list(positive)?, read_word_list(negative)?))
    }

    pub fn polarity(&self, word: &str) -> Polarity {
        let word = word.trim().to_lowercase();
        if self.positive.contains(&word) {
            Polarity::Positive
        } else if self.negative.contains(&word) {
            Polarity::Negative
        } else {
            Polarity::Unknown
        }
    }

    pub fn num_positive(&self) -> usize { self.positive.len() }

    pub fn num_negative(&self) -> usize { self.negative.len() }

    /// Keep the hits whose rating agrees with the polarity of at least one
    /// opinion term. Hits with a rating that is not an integer are dropped.
    /// The output is deduplicated and keeps input order.
    pub fn filter<'a, I>(&self, hits: I, opinion1: &str, opinion2: Option<&str>) -> Vec<RatedHit>
    where
        I: IntoIterator<Item = &'a Hit>,
    {
        let polarities: Vec<Polarity> = std::iter::once(opinion1)
            .chain(opinion2)
            .map(|w| self.polarity(w))
            .filter(|p| *p != Polarity::Unknown)
            .collect();
        if polarities.is_empty() {
            tracing::debug!(opinion1, ?opinion2, "no opinion term in lexicon, nothing passes");
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for hit in hits {
            let Some(rating) = parse_rating(&hit.rating) else { continue };
            if !polarities.iter().any(|p| p.admits(rating)) {
                continue;
            }
            let rated = RatedHit { review_id: hit.review_id.clone(), rating };
            if seen.insert(rated.clone()) {
                out.push(rated);
            }
        }
        out
    }
}

/// Read one word per line, lowercased. Blank lines and `;` comment lines
/// are skipped.
pub fn read_word_list<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let mut words = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let word = line.trim();
        if word.is_empty() || word.starts_with(';') { continue; }
        words.push(word.to_lowercase());
    }
    Ok(words)
}

/// Boolean search followed by the lexicon rating filter.
pub fn boolean_and_rating_search(index: &InvertedIndex, lexicon: &OpinionLexicon, query: &BooleanQuery) -> Vec<RatedHit> {
    let hits = boolean_search(index, query);
    let filtered = lexicon.filter(&hits, &query.opinion1, query.opinion2.as_deref());
    tracing::debug!(candidates = hits.len(), kept = filtered.len(), "rating filter");
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lexicon() -> OpinionLexicon {
        OpinionLexicon::new(["great", "good", "nice"], ["bad", "poor", "nice"])
    }

    fn hit(id: &str, rating: &str) -> Hit {
        Hit { review_id: id.into(), rating: rating.into() }
    }

    #[test]
    fn classifies_words() {
        let lex = lexicon();
        assert_eq!(lex.polarity("Great"), Polarity::Positive);
        assert_eq!(lex.polarity("poor"), Polarity::Negative);
        assert_eq!(lex.polarity("battery"), Polarity::Unknown);
        // listed in both
        assert_eq!(lex.polarity("nice"), Polarity::Positive);
    }

    #[test]
    fn positive_needs_rating_above_three() {
        let hits = vec![hit("a", "5"), hit("b", "3"), hit("c", "4")];
        let kept = lexicon().filter(&hits, "great", None);
        assert_eq!(kept, vec![RatedHit { review_id: "a".into(), rating: 5 }, RatedHit { review_id: "c".into(), rating: 4 }]);
    }

    #[test]
    fn negative_needs_rating_at_most_three() {
        let hits = vec![hit("a", "5"), hit("b", "3"), hit("c", "1")];
        let kept: Vec<_> = lexicon().filter(&hits, "bad", None).into_iter().map(|h| h.review_id).collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn either_opinion_admits() {
        let hits = vec![hit("a", "5"), hit("b", "2")];
        let kept = lexicon().filter(&hits, "great", Some("bad"));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn unknown_opinions_admit_nothing() {
        let hits = vec![hit("a", "5"), hit("b", "2")];
        assert!(lexicon().filter(&hits, "battery", Some("screen")).is_empty());
        // a known second opinion still filters
        let kept = lexicon().filter(&hits, "battery", Some("poor"));
        assert_eq!(kept, vec![RatedHit { review_id: "b".into(), rating: 2 }]);
    }

    #[test]
    fn bad_ratings_are_skipped_not_fatal() {
        let hits = vec![hit("a", "five"), hit("b", ""), hit("c", "4.0")];
        let kept = lexicon().filter(&hits, "good", None);
        assert_eq!(kept, vec![RatedHit { review_id: "c".into(), rating: 4 }]);
    }

    #[test]
    fn output_is_deduplicated() {
        let hits = vec![hit("a", "5"), hit("a", "5")];
        assert_eq!(lexicon().filter(&hits, "great", Some("good")).len(), 1);
    }

    #[test]
    fn reads_word_lists_with_comments() {
        let text = ";;; opinion lexicon\n;\n\nGood\n  great \n";
        let words = read_word_list(Cursor::new(text)).unwrap();
        assert_eq!(words, vec!["good", "great"]);
    }
}
