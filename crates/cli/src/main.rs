use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

mod commands;

use commands::run::RunArgs;
use commands::SelectionArgs;

/// Parathread - run dependency graphs of commands concurrently
#[derive(Parser)]
#[command(name = "parathread")]
#[command(about = "Run every node of a dependency graph concurrently, each after its dependencies")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a thread file
    Run(RunArgs),
    /// Show the dependency graph of a thread file
    Graph {
        /// Thread file (YAML, or TOML with a .toml extension)
        file: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Print Graphviz DOT instead of a listing
        #[arg(long)]
        dot: bool,
    },
    /// Print the JSON schema of thread files
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Graph {
            file,
            selection,
            dot,
        } => commands::graph::execute(&file, &selection, dot),
        Commands::Schema => commands::schema::execute(),
    }
}
