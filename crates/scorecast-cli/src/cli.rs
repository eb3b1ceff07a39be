//! Command-line interface definitions and parsing

use clap::Parser;

/// Subscribe to games, publish event reports and write game summaries
///
/// Commands are read from standard input, one per line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}
