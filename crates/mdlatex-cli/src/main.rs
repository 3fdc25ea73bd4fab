// SPDX-License-Identifier: AGPL-3.0-or-later
//! mdlatex - convert Markdown with LaTeX math to Word documents

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "mdlatex")]
#[command(version, about = "Convert Markdown with LaTeX math to .docx with native equations")]
struct Cli {
    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert source files to .docx
    Convert {
        /// Markdown or TeX sources
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the document model of a source file as JSON
    Dump {
        input: PathBuf,

        /// Print the token stream instead
        #[arg(long)]
        tokens: bool,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Delete staged and converted files past their maximum age
    Clean {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Convert {
            inputs,
            output,
            config,
        } => commands::convert(inputs, output, config.as_deref()).await,
        Command::Dump {
            input,
            tokens,
            config,
        } => commands::dump(&input, tokens, config.as_deref()),
        Command::Clean { config } => commands::clean(config.as_deref()).await,
    }
}
