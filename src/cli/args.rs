use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "recording-sync")]
#[command(about = "Copy today's Zoom cloud recordings into Google Drive", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ~/.config/recording-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Copy today's recordings (default when no subcommand is given)
    Run(RunCliArgs),
    /// List recordings that would be copied, without touching Drive
    List,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug, Default)]
pub struct RunCliArgs {
    /// Trigger payload as JSON; accepted for parity with scheduled invocations
    #[arg(long)]
    pub event: Option<String>,
}
