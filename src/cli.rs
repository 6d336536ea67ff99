use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "retrace", about = "Local web-history memory with semantic recall")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the capture daemon (HTTP API).
    Daemon {},

    /// Ingest a single captured visit from a JSON file (or stdin).
    Ingest {
        /// Path to a capture payload; reads stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Semantic search over the visit history.
    Search {
        query: String,

        /// Number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Regenerate missing vector entries from stored summaries.
    Backfill {},
}
