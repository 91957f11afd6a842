//! CLI module for the embedding pipeline.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Embed a text corpus and load it into a vector store.
#[derive(Debug, Parser)]
#[command(name = "embedpipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed a corpus file and upsert it into the vector store
    Load(commands::LoadArgs),

    /// Run a nearest-neighbor query against the vector store
    Query(commands::QueryArgs),

    /// Check vector store connectivity and counts
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
