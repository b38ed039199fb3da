use anyhow::Result;
/// Cofounder Match Bot - command line entry point
///
/// Runs screening sessions, formats the candidate log and lists models.
use clap::Parser;
use matchbot_cli::cli::{Cli, Commands};
use matchbot_cli::commands;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            commands::run_session(args).await?;
        }
        Commands::Format {
            input,
            output,
            words_per_line,
        } => {
            commands::run_format(&input, &output, words_per_line)?;
        }
        Commands::Models { config } => {
            commands::run_models(config.as_deref()).await?;
        }
    }

    Ok(())
}
