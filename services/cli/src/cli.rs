//! Command-line interface definition.

use clap::{Parser, Subcommand};
use deckgen_core::{assistant, chat};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "deckgen", version, about = "Generate slide decks with AI")]
pub struct Cli {
    /// Directory decks are written to (overrides OUTPUT_DIR).
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a deck directly from a topic.
    Generate {
        #[arg(long)]
        topic: String,
        /// Requested number of slides; the model may return more or fewer.
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
        slides: u32,
        /// Use canned text and skip images; no API key required.
        #[arg(long)]
        offline: bool,
    },
    /// Ask an assistant run for a deck and print the conversation.
    Assistant {
        #[arg(long, default_value = assistant::DEFAULT_PROMPT)]
        prompt: String,
    },
    /// Ask a single chat completion for a deck via function calling.
    Chat {
        #[arg(long, default_value = chat::DEFAULT_PROMPT)]
        prompt: String,
    },
}
