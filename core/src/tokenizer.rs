use crate::config::TextConfig;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::io::BufRead;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

pub const POSITIVE_SMILEY: &str = "positive_smiley";
pub const NEGATIVE_SMILEY: &str = "negative_smiley";

lazy_static! {
    static ref POSITIVE_SMILEY_RE: Regex = Regex::new(r":-\)|:\)").expect("valid regex");
    static ref NEGATIVE_SMILEY_RE: Regex = Regex::new(r":-\(|:\(").expect("valid regex");
    static ref NON_WORD_RE: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

const BUILTIN_STOPWORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","can't","cannot","could","couldn't",
    "did","didn't","do","does","doesn't","doing","don't","down","during",
    "each","few","for","from","further",
    "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
    "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
    "let's","me","more","most","mustn't","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
    "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
    "under","until","up","very",
    "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
    "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
];

/// Stopwords, stored in the same form tokens take after punctuation removal,
/// so `don't` in a list matches the token `dont`.
#[derive(Debug, Clone, Default)]
pub struct StopwordSet {
    words: HashSet<String>,
}

impl StopwordSet {
    pub fn new() -> Self { Self::default() }

    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.extend(BUILTIN_STOPWORDS.iter().copied());
        set
    }

    pub fn insert(&mut self, word: &str) {
        let w = NON_WORD_RE.replace_all(&word.trim().to_lowercase(), "").into_owned();
        if !w.is_empty() {
            self.words.insert(w);
        }
    }

    pub fn extend<'a, I: IntoIterator<Item = &'a str>>(&mut self, words: I) {
        for w in words {
            self.insert(w);
        }
    }

    /// Add every non-blank line of a newline-delimited list.
    pub fn extend_from_reader<R: BufRead>(&mut self, reader: R) -> std::io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            self.insert(&line);
        }
        Ok(())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(&token.to_lowercase())
    }

    pub fn len(&self) -> usize { self.words.len() }

    pub fn is_empty(&self) -> bool { self.words.is_empty() }
}

/// Turns raw review text into index terms.
///
/// Built once from a `TextConfig` and the injected stopword lists; holds no
/// mutable state, so one instance serves a whole index build.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: TextConfig,
    stopwords: StopwordSet,
}

impl Normalizer {
    /// `extra_stopwords` is merged with the built-in list unless the config
    /// turns the built-in list off.
    pub fn new(config: TextConfig, extra_stopwords: StopwordSet) -> Self {
        let mut stopwords = if config.builtin_stopwords { StopwordSet::builtin() } else { StopwordSet::new() };
        stopwords.words.extend(extra_stopwords.words);
        Self { config, stopwords }
    }

    pub fn default_config() -> Self {
        Self::new(TextConfig::default(), StopwordSet::new())
    }

    pub fn config(&self) -> &TextConfig { &self.config }

    pub fn stopwords(&self) -> &StopwordSet { &self.stopwords }

    /// Normalize text into lemmatized terms, in text order. Never fails;
    /// content-free input yields an empty vector.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let mut text = if self.config.smileys { replace_smileys(text) } else { text.to_string() };
        if self.config.unicode_normalize {
            text = text.nfkc().collect();
        }
        let cleaned = NON_WORD_RE.replace_all(&text.to_lowercase(), "").into_owned();

        cleaned
            .unicode_words()
            .filter(|w| is_sentinel(w) || w.chars().all(char::is_alphanumeric))
            .filter(|w| !self.stopwords.contains(w))
            .map(|w| lemmatize(&self.config, w))
            .collect()
    }

    /// The index term a single query word is looked up under.
    pub fn query_term(&self, word: &str) -> String {
        query_term(&self.config, word)
    }
}

/// Map a query word to index-term form under `config`: the character
/// cleanup of `Normalizer::normalize` followed by the same lemmatizer or
/// stemmer. Stopwords are not removed; a stopword simply has no postings.
pub fn query_term(config: &TextConfig, word: &str) -> String {
    let mut word = word.trim().to_string();
    if config.unicode_normalize {
        word = word.nfkc().collect();
    }
    let cleaned = NON_WORD_RE.replace_all(&word.to_lowercase(), "").into_owned();
    if cleaned.is_empty() {
        return cleaned;
    }
    lemmatize(config, &cleaned)
}

fn lemmatize(config: &TextConfig, token: &str) -> String {
    if is_sentinel(token) {
        token.to_string()
    } else if config.stemming {
        STEMMER.stem(token).into_owned()
    } else {
        lemmatize_noun(token)
    }
}

fn is_sentinel(token: &str) -> bool {
    token == POSITIVE_SMILEY || token == NEGATIVE_SMILEY
}

fn replace_smileys(text: &str) -> String {
    let text = POSITIVE_SMILEY_RE.replace_all(text, " positive_smiley ");
    NEGATIVE_SMILEY_RE.replace_all(&text, " negative_smiley ").into_owned()
}

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("buses", "bus"), ("children", "child"), ("echoes", "echo"), ("feet", "foot"),
    ("gases", "gas"), ("geese", "goose"), ("halves", "half"), ("heroes", "hero"),
    ("knives", "knife"), ("leaves", "leaf"), ("lenses", "lens"), ("lives", "life"),
    ("men", "man"), ("mice", "mouse"), ("potatoes", "potato"), ("quizzes", "quiz"),
    ("shelves", "shelf"), ("teeth", "tooth"), ("tomatoes", "tomato"), ("viruses", "virus"),
    ("wives", "wife"), ("women", "woman"),
];

// Words ending in `s` that are not plurals.
const NOT_PLURAL: &[&str] = &[
    "always", "does", "has", "headquarters", "lens", "news", "perhaps",
    "series", "species", "thanks", "was", "whereas", "yes",
];

// Singulars ending in `-ie` or `-che` whose plural the suffix rules would
// cut too far (`movies` is not `movy`, `niches` is not `nich`).
const E_FINAL_NOUNS: &[&str] = &[
    "avalanche", "brownie", "calorie", "cliche", "cookie", "die", "freebie",
    "genie", "goalie", "hoodie", "lie", "movie", "newbie", "niche", "pie",
    "prairie", "quiche", "rookie", "selfie", "smoothie", "tie", "zombie",
];

// Suffix detachment rules for nouns, longest suffix first. `-zes` plurals
// (`sizes`, `prizes`) fall through to the plain `-s` rule.
const NOUN_RULES: &[(&str, &str)] = &[
    ("sses", "ss"), ("zzes", "zz"), ("ches", "ch"), ("shes", "sh"), ("xes", "x"),
    ("ies", "y"), ("s", ""),
];

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Reduce an English plural noun to its singular base form. Words that are
/// not recognizably plural come back unchanged.
pub fn lemmatize_noun(word: &str) -> String {
    if let Some((_, lemma)) = IRREGULAR_PLURALS.iter().find(|(plural, _)| *plural == word) {
        return (*lemma).to_string();
    }
    if word.chars().count() <= 3
        || NOT_PLURAL.contains(&word)
        || word.ends_with("ss")
        || word.ends_with("us")
        || word.ends_with("is")
    {
        return word.to_string();
    }
    if let Some(singular) = word.strip_suffix('s') {
        if E_FINAL_NOUNS.contains(&singular) {
            return singular.to_string();
        }
        // `headaches`, `caches`: a consonant before `-aches` means `-ache`;
        // `beaches`, `coaches` keep the `-ch` rule
        if let Some(head) = word.strip_suffix("aches") {
            if head.chars().last().map_or(true, |c| !is_vowel(c)) {
                return singular.to_string();
            }
        }
    }
    for (suffix, replacement) in NOUN_RULES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if stem.chars().count() < 2 { break; }
            return format!("{stem}{replacement}");
        }
    }
    word.to_string()
}
