use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use review_core::persist::{load_all, load_embeddings, load_lexicon, load_stopwords, save_index, save_meta, IndexPaths, MetaFile};
use review_core::{
    boolean_and_rating_search, boolean_search, embedding_search, BooleanQuery, Config, EmbeddingQuery, IndexBuilder,
    InvertedIndex, Method, Normalizer, RawReview,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a review index and run boolean, rating and embedding queries against it", long_about = None)]
struct Cli {
    /// JSON settings file (text normalization and search defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Extra stopword list, one word per line (repeatable)
        #[arg(long)]
        stopwords: Vec<PathBuf>,
    },
    /// Boolean search over aspect and opinion terms
    Boolean(BooleanArgs),
    /// Boolean search filtered by rating and opinion lexicon
    Rating {
        #[command(flatten)]
        query: BooleanArgs,
        /// Positive opinion words
        #[arg(long, default_value = "positive-words.txt")]
        positive: PathBuf,
        /// Negative opinion words
        #[arg(long, default_value = "negative-words.txt")]
        negative: PathBuf,
    },
    /// Rank reviews by embedding similarity to the query
    Embedding {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Aspect terms, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        aspects: Vec<String>,
        /// Opinion terms, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        opinions: Vec<String>,
        /// method1, method2 or method3
        #[arg(long)]
        method: String,
        /// GloVe-format embedding file
        #[arg(long)]
        embeddings: PathBuf,
        /// Minimum combined similarity (defaults to the configured threshold)
        #[arg(long)]
        threshold: Option<f32>,
    },
}

#[derive(Args)]
struct BooleanArgs {
    /// Index directory
    #[arg(long, default_value = "./index")]
    index: String,
    #[arg(long)]
    aspect1: String,
    #[arg(long)]
    aspect2: String,
    #[arg(long)]
    opinion1: String,
    #[arg(long)]
    opinion2: Option<String>,
    /// method1 (OR), method2 (AND) or method3 ((OR) AND)
    #[arg(long)]
    method: String,
}

impl BooleanArgs {
    fn query(&self) -> Result<BooleanQuery> {
        let method: Method = self.method.parse()?;
        Ok(BooleanQuery::new(&self.aspect1, &self.aspect2, &self.opinion1, method)
            .with_second_opinion(self.opinion2.as_deref()))
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { input, output, stopwords } => build_index(&input, &output, &stopwords, &config),
        Commands::Boolean(args) => {
            let query = args.query()?;
            let index = open_index(&args.index)?;
            print_json(&boolean_search(&index, &query))
        }
        Commands::Rating { query, positive, negative } => {
            let q = query.query()?;
            let index = open_index(&query.index)?;
            let lexicon = load_lexicon(&positive, &negative)?;
            print_json(&boolean_and_rating_search(&index, &lexicon, &q))
        }
        Commands::Embedding { index, aspects, opinions, method, embeddings, threshold } => {
            let method: Method = method.parse()?;
            let query = EmbeddingQuery::new(&aspects, &opinions, method)
                .with_threshold(threshold.unwrap_or(config.search.threshold));
            let index = open_index(&index)?;
            let table = load_embeddings(&embeddings)?;
            print_json(&embedding_search(&index, &table, &query)?)
        }
    }
}

fn open_index(dir: &str) -> Result<InvertedIndex> {
    let (index, meta) = load_all(&IndexPaths::new(dir))?;
    tracing::info!(
        num_docs = meta.num_docs,
        num_terms = meta.num_terms,
        stemming = meta.text.stemming,
        created_at = %meta.created_at,
        "loaded index"
    );
    Ok(index)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn corpus_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

fn build_index(input: &str, output: &str, stopword_files: &[PathBuf], config: &Config) -> Result<()> {
    let input_path = Path::new(input);
    let out_paths = IndexPaths::new(output);

    let files = corpus_files(input_path);
    if files.is_empty() {
        anyhow::bail!("no .json or .jsonl corpus files under {input}");
    }

    let extra = load_stopwords(stopword_files)?;
    let normalizer = Normalizer::new(config.text.clone(), extra);
    tracing::info!(files = files.len(), stopwords = normalizer.stopwords().len(), "indexing corpus");

    let mut builder = IndexBuilder::new(&normalizer);
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            index_jsonl(&file, &mut builder)?;
        } else {
            index_json(&file, &mut builder)?;
        }
    }
    let index = builder.finish();

    save_index(&out_paths, &index)?;
    save_meta(&out_paths, &MetaFile::for_index(&index))?;

    tracing::info!(output, "index build complete");
    Ok(())
}

fn index_jsonl(file: &Path, builder: &mut IndexBuilder<'_>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: RawReview = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed review", file.display(), n + 1))?;
        builder.add(doc)?;
    }
    Ok(())
}

fn index_json(file: &Path, builder: &mut IndexBuilder<'_>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: RawReview = serde_json::from_value(v)?;
                builder.add(doc)?;
            }
        }
        serde_json::Value::Object(_) => {
            let doc: RawReview = serde_json::from_value(json)?;
            builder.add(doc)?;
        }
        _ => tracing::warn!(file = %file.display(), "expected a review object or array, skipping"),
    }
    Ok(())
}
