use anyhow::Result;
use clap::Parser;
use recording_sync::cli::{handle_list_command, handle_run_command, Cli, CliCommand, RunCliArgs};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Some(CliCommand::Version) => {
            println!("recording-sync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::List) => handle_list_command(config_path).await,
        Some(CliCommand::Run(args)) => handle_run_command(args, config_path).await,
        None => handle_run_command(RunCliArgs::default(), config_path).await,
    }
}
