use anyhow::Result;
use axum::Router;
use clap::Parser;
use review_core::Config;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use server::{build_app, ServerOptions};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Positive opinion words, one per line
    #[arg(long, default_value = "positive-words.txt")]
    positive: PathBuf,
    /// Negative opinion words, one per line
    #[arg(long, default_value = "negative-words.txt")]
    negative: PathBuf,
    /// Embedding table as NAME=PATH, e.g. glove=glove.6B.100d.txt (repeatable)
    #[arg(long, value_parser = parse_named_path)]
    embeddings: Vec<(String, PathBuf)>,
    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn parse_named_path(s: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = s.split_once('=').ok_or_else(|| format!("expected NAME=PATH, got {s:?}"))?;
    if name.trim().is_empty() || path.trim().is_empty() {
        return Err(format!("expected NAME=PATH, got {s:?}"));
    }
    Ok((name.trim().to_string(), PathBuf::from(path.trim())))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;
    let app: Router = build_app(ServerOptions {
        index_dir: args.index,
        positive_words: args.positive,
        negative_words: args.negative,
        embeddings: args.embeddings,
        config,
    })?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
