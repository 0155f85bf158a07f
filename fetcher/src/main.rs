use anyhow::{anyhow, Context, Result};
use clap::Parser;
use reqwest::Client;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio::task::JoinSet;
use url::Url;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(about = "Download stopword and opinion-lexicon word lists for the indexer")]
struct Cli {
    /// File listing sources, one `NAME URL` pair per line
    #[arg(long)]
    sources: String,
    /// Output directory for NAME.txt files and manifest.json
    #[arg(long, default_value = "./data")]
    output: String,
    /// Number of downloads in flight
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// User-Agent string
    #[arg(long, default_value = "review-search-fetcher/0.1")]
    user_agent: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Source {
    name: String,
    url: Url,
}

#[derive(Debug, Serialize)]
struct ManifestEntry {
    name: String,
    url: String,
    file: String,
    words: usize,
    sha1: String,
    fetched_at: String,
}

fn parse_sources<R: BufRead>(reader: R) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') { continue; }
        let (name, url) = s
            .split_once(char::is_whitespace)
            .ok_or_else(|| anyhow!("line {}: expected `NAME URL`", n + 1))?;
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(anyhow!("line {}: source name {:?} may only use letters, digits, '-' and '_'", n + 1, name));
        }
        let url = Url::parse(url.trim()).with_context(|| format!("line {}: bad url", n + 1))?;
        sources.push(Source { name: name.to_string(), url });
    }
    Ok(sources)
}

/// One lowercase word per line; blank lines and `;` comments dropped.
fn normalize_word_list(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(';'))
        .map(str::to_lowercase)
        .collect()
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

async fn fetch(client: Client, source: Source, out_dir: PathBuf) -> Result<ManifestEntry> {
    let resp = client.get(source.url.clone()).send().await?;
    if !resp.status().is_success() {
        return Err(anyhow!("{}: HTTP {}", source.url, resp.status()));
    }
    let bytes = resp.bytes().await?;
    let body = String::from_utf8_lossy(&bytes);
    let words = normalize_word_list(&body);
    let mut content = words.join("\n");
    content.push('\n');

    let file = format!("{}.txt", source.name);
    fs::write(out_dir.join(&file), &content).with_context(|| format!("writing {file}"))?;
    Ok(ManifestEntry {
        name: source.name,
        url: source.url.to_string(),
        file,
        words: words.len(),
        sha1: sha1_hex(content.as_bytes()),
        fetched_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    })
}

fn write_manifest(out_dir: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let mut out = BufWriter::new(File::create(out_dir.join("manifest.json"))?);
    serde_json::to_writer_pretty(&mut out, entries)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();
    let out_dir = PathBuf::from(&args.output);
    fs::create_dir_all(&out_dir)?;

    let sources = parse_sources(BufReader::new(File::open(&args.sources)?))?;
    if sources.is_empty() { return Err(anyhow!("no sources in {}", args.sources)); }
    tracing::info!(sources = sources.len(), concurrency = args.concurrency, output = %args.output, "fetching word lists");

    let client = Client::builder()
        .user_agent(args.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    let mut pending = sources.into_iter();
    let mut inflight = JoinSet::new();
    let mut entries = Vec::new();
    let mut failed = 0usize;
    loop {
        while inflight.len() < args.concurrency.max(1) {
            let Some(source) = pending.next() else { break };
            inflight.spawn(fetch(client.clone(), source, out_dir.clone()));
        }
        let Some(joined) = inflight.join_next().await else { break };
        match joined? {
            Ok(entry) => {
                tracing::info!(name = %entry.name, words = entry.words, "fetched");
                entries.push(entry);
            }
            Err(err) => {
                tracing::error!(error = %err, "fetch failed");
                failed += 1;
            }
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    write_manifest(&out_dir, &entries)?;
    tracing::info!(fetched = entries.len(), failed, "done");
    if failed > 0 {
        return Err(anyhow!("{failed} source(s) could not be fetched"));
    }
    Ok(())
}
