use crate::config::TextConfig;
use crate::embedding::EmbeddingTable;
use crate::index::InvertedIndex;
use crate::lexicon::OpinionLexicon;
use crate::tokenizer::StopwordSet;
use anyhow::{Context, Result};
use bincode;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
    /// Normalization the index was built with.
    pub text: TextConfig,
}

impl MetaFile {
    pub fn for_index(index: &InvertedIndex) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { num_docs: index.num_docs(), num_terms: index.num_terms(), created_at, version: FORMAT_VERSION, text: index.text_config().clone() }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let f = File::create(paths.index()).with_context(|| format!("creating {}", paths.index().display()))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, index)?;
    w.flush()?;
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let mut f = File::open(paths.index()).with_context(|| format!("opening {}", paths.index().display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index = bincode::deserialize(&buf)?;
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    if meta.version != FORMAT_VERSION {
        anyhow::bail!("index format version {} is not supported (expected {})", meta.version, FORMAT_VERSION);
    }
    Ok(meta)
}

/// Load the index and its metadata, checking that they agree. Query words
/// are mapped to index terms with the text settings recorded here.
pub fn load_all(paths: &IndexPaths) -> Result<(InvertedIndex, MetaFile)> {
    let meta = load_meta(paths)?;
    let index = load_index(paths)?;
    if index.num_docs() != meta.num_docs {
        anyhow::bail!("meta.json lists {} documents, index.bin holds {}", meta.num_docs, index.num_docs());
    }
    if index.text_config() != &meta.text {
        anyhow::bail!(
            "meta.json text settings {:?} differ from the ones index.bin was built with {:?}",
            meta.text,
            index.text_config()
        );
    }
    Ok((index, meta))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(f))
}

/// Merge newline-delimited stopword files into one set.
pub fn load_stopwords<P: AsRef<Path>>(files: &[P]) -> Result<StopwordSet> {
    let mut set = StopwordSet::new();
    for file in files {
        let path = file.as_ref();
        set.extend_from_reader(open(path)?).with_context(|| format!("reading {}", path.display()))?;
    }
    Ok(set)
}

pub fn load_lexicon(positive: &Path, negative: &Path) -> Result<OpinionLexicon> {
    let lexicon = OpinionLexicon::from_readers(open(positive)?, open(negative)?)?;
    tracing::info!(positive = lexicon.num_positive(), negative = lexicon.num_negative(), "loaded opinion lexicon");
    Ok(lexicon)
}

pub fn load_embeddings(path: &Path) -> Result<EmbeddingTable> {
    let table = EmbeddingTable::from_glove_reader(open(path)?).with_context(|| format!("reading {}", path.display()))?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::RawReview;
    use crate::tokenizer::Normalizer;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn index_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let docs = vec![RawReview::new("1", 5, "great battery life"), RawReview::new("2", 1, "bad battery")];
        let index = InvertedIndex::build(&Normalizer::default_config(), docs).unwrap();
        save_index(&paths, &index).unwrap();
        save_meta(&paths, &MetaFile::for_index(&index)).unwrap();

        let (loaded, meta) = load_all(&paths).unwrap();
        assert_eq!(meta.num_docs, 2);
        assert_eq!(meta.version, FORMAT_VERSION);
        assert_eq!(loaded.postings("battery"), index.postings("battery"));
        assert_eq!(loaded.review_by_id("1").unwrap().rating, "5");
    }

    #[test]
    fn stemming_settings_survive_reload() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let text = TextConfig { stemming: true, ..TextConfig::default() };
        let normalizer = Normalizer::new(text.clone(), StopwordSet::new());
        let docs = vec![RawReview::new("1", 5, "great battery life")];
        let index = InvertedIndex::build(&normalizer, docs).unwrap();
        save_index(&paths, &index).unwrap();
        save_meta(&paths, &MetaFile::for_index(&index)).unwrap();

        let (loaded, meta) = load_all(&paths).unwrap();
        assert_eq!(meta.text, text);
        assert_eq!(loaded.term_postings("battery"), &[0]);
    }

    #[test]
    fn mismatched_text_settings_are_rejected() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let index = InvertedIndex::build(&Normalizer::default_config(), vec![RawReview::new("1", 5, "fine")]).unwrap();
        save_index(&paths, &index).unwrap();
        let mut meta = MetaFile::for_index(&index);
        meta.text.stemming = true;
        save_meta(&paths, &meta).unwrap();
        assert!(load_all(&paths).is_err());
    }

    #[test]
    fn rejects_other_format_versions() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let mut meta = MetaFile::for_index(&InvertedIndex::new());
        meta.version = FORMAT_VERSION + 1;
        save_meta(&paths, &meta).unwrap();
        assert!(load_meta(&paths).is_err());
    }

    #[test]
    fn loads_word_lists() {
        let dir = tempdir().unwrap();
        let pos = dir.path().join("positive-words.txt");
        let neg = dir.path().join("negative-words.txt");
        let stop = dir.path().join("stopwords.txt");
        fs::write(&pos, "; header\ngreat\n").unwrap();
        fs::write(&neg, "bad\n").unwrap();
        fs::write(&stop, "really\nQuite\n").unwrap();

        let lexicon = load_lexicon(&pos, &neg).unwrap();
        assert_eq!(lexicon.num_positive(), 1);
        let stopwords = load_stopwords(&[&stop]).unwrap();
        assert!(stopwords.contains("quite"));
        assert!(load_stopwords(&[dir.path().join("missing.txt")]).is_err());
    }
}
