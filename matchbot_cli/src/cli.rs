use clap::{Args, Parser, Subcommand};
use matchbot_core::candidate_log::DEFAULT_LOG_PATH;
use matchbot_core::formatter::{DEFAULT_OUTPUT_PATH, DEFAULT_WORDS_PER_LINE};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "matchbot")]
#[command(about = "Cofounder Match Bot - screens candidate profiles with a local LLM", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the browser and screen profiles one by one
    Run(RunArgs),
    /// Re-wrap the candidate log into a readable copy
    Format {
        /// Candidate log to read
        #[arg(short, long, default_value = DEFAULT_LOG_PATH)]
        input: PathBuf,
        /// Where to write the formatted copy
        #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,
        /// Words per output line
        #[arg(short, long, default_value_t = DEFAULT_WORDS_PER_LINE)]
        words_per_line: usize,
    },
    /// List the models the inference server offers
    Models {
        /// Path to config YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to config YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Model identifier, overrides the config file
    #[arg(short, long)]
    pub model: Option<String>,
    /// Ask before moving to each next profile
    #[arg(long)]
    pub confirm: bool,
    /// Candidate log, overrides the config file
    #[arg(short, long)]
    pub log: Option<PathBuf>,
    /// Run Chrome without a window
    #[arg(long)]
    pub headless: bool,
}
