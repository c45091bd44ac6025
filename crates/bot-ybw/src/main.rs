//! UCI front end for the parallel search engine.
//!
//! Reads commands from stdin and answers on stdout. Diagnostics go to
//! stderr through `tracing`; set `RUST_LOG=debug` to see them.

mod clock;
mod session;

use anyhow::Context;
use chess_search::EngineConfig;
use clap::Parser;
use session::{Session, SharedWriter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bot-ybw")]
#[command(about = "UCI chess engine with a parallel alpha-beta search")]
struct Args {
    /// TOML file with `threads` and `hash_mb`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Search threads, overriding the config file
    #[arg(long)]
    threads: Option<usize>,

    /// Hash table size in MiB, overriding the config file
    #[arg(long)]
    hash: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(hash) = args.hash {
        config = config.with_hash_mb(hash);
    }
    tracing::info!(threads = config.threads, hash_mb = config.hash_mb, "starting");

    let mut session = Session::new(
        std::io::stdin().lock(),
        SharedWriter::new(std::io::stdout()),
        config,
    )?;
    session.run()
}
