use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{
    chunking::{DEFAULT_CHUNK_CHARS, DEFAULT_OVERLAP_CHARS},
    embedding::DEFAULT_HASH_DIMENSION,
    search::{SearchMode, DEFAULT_RRF_K, DEFAULT_TOPK},
};

#[derive(Debug, Parser)]
#[command(
    name = "chunkfuse",
    about = "Hybrid dense + BM25 document search with reciprocal rank fusion"
)]
pub struct Cli {
    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build an index snapshot from a directory of documents
    Build(BuildArgs),
    /// Search a built index
    Search(SearchArgs),
    /// Show index status and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Build --

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Directory of source documents (.md and .txt, recursive)
    pub source_dir: PathBuf,

    /// Directory to write the index artifacts into
    #[arg(long, default_value = "index")]
    pub index_dir: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_CHARS)]
    pub chunk_chars: usize,

    /// Overlap between consecutive chunks in characters
    #[arg(long, default_value_t = DEFAULT_OVERLAP_CHARS)]
    pub overlap_chars: usize,

    /// Embedding batch size
    #[arg(long, default_value = "64")]
    pub batch_size: usize,

    /// Embedding dimension
    #[arg(long, default_value_t = DEFAULT_HASH_DIMENSION)]
    pub dim: usize,

    /// Rebuild even if the source files are unchanged
    #[arg(long)]
    pub force: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Directory holding the index artifacts
    #[arg(long, default_value = "index")]
    pub index_dir: PathBuf,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOPK)]
    pub topk: usize,

    /// Which ranking(s) to run
    #[arg(long, value_enum, default_value = "hybrid")]
    pub mode: SearchMode,

    /// Reciprocal rank fusion constant
    #[arg(long, default_value_t = DEFAULT_RRF_K)]
    pub rrf_k: u32,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Directory holding the index artifacts
    #[arg(long, default_value = "index")]
    pub index_dir: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "chunkfuse",
            &mut std::io::stdout(),
        );
    }
}
