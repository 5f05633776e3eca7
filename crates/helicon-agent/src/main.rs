//! Helicon — evidence ranking over a protein knowledge graph.
//! Entry point for the `helicon` binary.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use helicon_common::{EngineConfig, NodeKind, Task, CONFIG_ENV_VAR};
use helicon_kg::{InMemoryGraphStore, TimeoutGraphStore};
use helicon_ranker::EvidenceEngine;

#[derive(Parser)]
#[command(name = "helicon")]
#[command(author, version, about = "Helicon - evidence ranking for protein knowledge graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./helicon.toml)
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank candidate diseases or therapeutics for a protein
    Rank {
        #[arg(short, long)]
        source: String,

        /// disease_prediction | therapeutic_recommendation
        #[arg(short, long)]
        task: Task,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Clip reported scores to [0, 1]
        #[arg(long)]
        clamp: bool,
    },

    /// List proteins similar to a protein
    Similar {
        #[arg(short, long)]
        source: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Scored evidence paths between a protein and a target node
    Paths {
        #[arg(short, long)]
        source: String,

        #[arg(short, long)]
        target: String,

        /// protein | disease | therapeutic
        #[arg(long, default_value = "disease")]
        target_kind: NodeKind,

        #[arg(long)]
        max_hops: Option<usize>,

        #[arg(long)]
        max_paths: Option<usize>,
    },

    /// Rank candidates and show evidence paths for the best one
    Explain {
        #[arg(short, long)]
        source: String,

        #[arg(short, long)]
        task: Task,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[arg(long)]
        max_hops: Option<usize>,

        #[arg(long)]
        max_paths: Option<usize>,
    },

    /// Fit relation weights from labelled examples (JSON lines)
    Train {
        examples: PathBuf,

        /// Where to write the weights (default: from config)
        #[arg(long)]
        weights_path: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let config = match path {
        Some(p) => EngineConfig::load_from(p),
        None => EngineConfig::load(),
    };
    config.context("Failed to load configuration")
}

fn build_engine(config: &EngineConfig) -> Result<EvidenceEngine> {
    let graph = InMemoryGraphStore::load_json(&config.graph.snapshot_path).with_context(|| {
        format!("Failed to load graph snapshot {}", config.graph.snapshot_path.display())
    })?;
    let store = TimeoutGraphStore::from_config(graph, &config.graph);
    Ok(EvidenceEngine::from_config(Arc::new(store), config))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("helicon=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "Helicon starting");

    let engine = build_engine(&config)?;
    let output = commands::run(&engine, &config, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
