use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "harbor",
    about = "Harbor: one state API in front of many key/value stores",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Runtime configuration file
    #[arg(short, long, global = true, default_value = "harbor.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List configured state stores and their features
    Stores,
    /// Replay a JSON script of state operations
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to a JSON array of steps
    pub script: PathBuf,
}
