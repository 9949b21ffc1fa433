//! CLI module
//!
//! Command-line interface over the library.
//!
//! # Commands
//!
//! - `settings` - Print the resolved settings
//! - `query` - Page through items loaded from a JSON file

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
