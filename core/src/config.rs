use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file shared by the indexer and the server. Every section and
/// field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub text: TextConfig,
    pub search: SearchConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Defaults when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

/// Text normalization settings, fixed when a `Normalizer` is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Apply NFKC before lowercasing.
    pub unicode_normalize: bool,
    /// Rewrite `:)` / `:(` style smileys into sentinel tokens.
    pub smileys: bool,
    /// Include the built-in English stopword list.
    pub builtin_stopwords: bool,
    /// Snowball stemming instead of the noun lemmatizer.
    pub stemming: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { unicode_normalize: true, smileys: true, builtin_stopwords: true, stemming: false }
    }
}

/// Query-time defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum combined cosine score kept by embedding search.
    pub threshold: f32,
    /// Embedding table used when a query names none.
    pub default_embedding: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { threshold: 0.5, default_embedding: "glove".to_string() }
    }
}
