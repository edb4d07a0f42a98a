//! deckgen command-line service
//!
//! Configuration, prompt loading, service wiring and argument parsing for
//! the `deckgen` binary, which is a thin wrapper around this library.

pub mod cli;
pub mod config;
pub mod prompts;
pub mod state;
