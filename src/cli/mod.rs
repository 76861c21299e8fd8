//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mmindex",
    version,
    about = "Multi-tenant multimodal document index",
    long_about = "mmindex maintains isolated per-tenant vector indices over text and visual \
                  embeddings, with heuristic relevance reranking (synonym expansion, intent \
                  detection, keyword fusion) on top of semantic search."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/mmindex/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest documents from a JSON file into a tenant index
    Ingest {
        /// Tenant identifier
        #[arg(short = 't', long)]
        client: String,

        /// JSON file holding an array of documents to index
        file: PathBuf,

        /// Replace chunks of documents that are already indexed
        #[arg(short, long)]
        update: bool,

        /// Enable visual search for a newly created tenant
        #[arg(long)]
        visual: bool,
    },

    /// Search a tenant index
    Search {
        /// Tenant identifier
        #[arg(short = 't', long)]
        client: String,

        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Search mode
        #[arg(short, long, value_parser = ["text", "visual", "combined"], default_value = "text")]
        mode: String,

        /// Drop candidates below this raw similarity before reranking
        #[arg(long, default_value = "0.0")]
        min_score: f32,

        /// Metadata filters as key=value pairs (repeatable)
        #[arg(short, long, value_name = "KEY=VALUE")]
        filter: Vec<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show statistics for a tenant index
    Stats {
        /// Tenant identifier
        #[arg(short = 't', long)]
        client: String,

        /// Show statistics in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Remove all chunks of a source file from a tenant index
    Remove {
        /// Tenant identifier
        #[arg(short = 't', long)]
        client: String,

        /// Source file whose chunks should be removed
        source_file: String,
    },

    /// Delete a tenant index entirely (memory and disk)
    Clear {
        /// Tenant identifier
        #[arg(short = 't', long)]
        client: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
