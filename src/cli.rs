use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dbas")]
#[command(about = "Interpreter for a small typed BASIC dialect")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML file with a [limits] table (defaults to ./project.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a source file and print the resolved program
    Parse(ParseArgs),
    /// Parse and execute a source file, starting at main()
    Run(RunArgs),
}

#[derive(clap::Args)]
pub struct ParseArgs {
    /// Input file path
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Input file path
    pub file: PathBuf,

    /// Print globals and heap cells to stderr after the run
    #[arg(long)]
    pub show_state: bool,
}
