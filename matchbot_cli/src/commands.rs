use crate::cli::RunArgs;
use crate::console::ConsoleOperator;
use anyhow::{Context, Result};
use matchbot_core::browser::{ChromeSession, LaunchOptions};
use matchbot_core::candidate_log::CandidateLog;
use matchbot_core::config::MatchbotConfig;
use matchbot_core::formatter::{self, FormatReport};
use matchbot_core::oracle::{verify_model, ClassificationOracle, InferenceBackend, OllamaClient};
use matchbot_core::session::{Session, SessionSummary, StopReason};
use matchbot_core::types::SessionMode;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Folds command-line flags over the file (or default) configuration.
pub fn resolve_config(args: &RunArgs) -> Result<MatchbotConfig> {
    let mut config = MatchbotConfig::load_or_default(args.config.as_deref())
        .context("Could not load configuration")?;

    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(log) = &args.log {
        config.log_path = log.display().to_string();
    }
    if args.confirm {
        config.mode = SessionMode::Confirmed;
    }
    if args.headless {
        config.headless = true;
    }
    Ok(config)
}

pub async fn run_session(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    println!(
        "🤖 Cofounder Match Bot v{} Starting...",
        matchbot_core::get_version()
    );
    match config.mode {
        SessionMode::Autonomous => println!("Mode: autonomous"),
        SessionMode::Confirmed => println!("Mode: confirm before each next profile"),
    }

    let backend = OllamaClient::new(&config.ollama_host)?;
    println!("Inference server: {}", backend.host());
    verify_model(&backend, &config.model).await.with_context(|| {
        format!(
            "Cannot use model {} at {}. Make sure Ollama is running and the model is pulled",
            config.model,
            backend.host()
        )
    })?;

    println!("\n🚀 Starting browser...");
    let browser = ChromeSession::launch(&LaunchOptions {
        headless: config.headless,
        chrome_executable: None,
    })
    .await
    .context("Failed to start Chrome")?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n\n🛑 Stopping bot...");
            interrupt.cancel();
        }
    });

    let oracle = ClassificationOracle::new(backend, &config.model)
        .with_timeout(config.inference_timeout());
    println!("✅ Connected to Ollama with model {}", oracle.model());
    let session = Session::new(
        browser,
        oracle,
        config.extractor(),
        CandidateLog::new(&config.log_path),
        ConsoleOperator::stdin(),
        config.session_config(),
    )
    .with_cancellation(token);

    let summary = session.run().await?;
    print_summary(&summary);
    Ok(())
}

pub fn print_summary(summary: &SessionSummary) {
    let reason = match summary.stop_reason {
        StopReason::Quit => "quit by operator",
        StopReason::Cancelled => "cancelled by operator",
        StopReason::Interrupted => "interrupted",
    };
    println!("\n📊 Session Summary ({}):", reason);
    println!("   Profiles visited: {}", summary.stats.profiles_visited);
    println!("   Profiles analyzed: {}", summary.stats.profiles_analyzed);
    println!("   Profiles skipped: {}", summary.stats.profiles_skipped);
    println!(
        "   Candidates saved this run: {}",
        summary.stats.candidates_saved
    );
    if let Some(total) = summary.stats.log_total {
        println!("   Candidates in log: {}", total);
    }
    println!(
        "📁 Check '{}' for recommended candidates",
        summary.log_path.display()
    );
}

pub fn run_format(input: &Path, output: &Path, words_per_line: usize) -> Result<FormatReport> {
    let report = formatter::format_file(input, output, words_per_line)?;
    println!(
        "Successfully formatted text from '{}' and saved to '{}'",
        input.display(),
        output.display()
    );
    println!("Original file had {} words", report.input_words);
    println!("Formatted into {} lines", report.output_lines);
    Ok(report)
}

pub async fn run_models(config_path: Option<&Path>) -> Result<Vec<String>> {
    let config =
        MatchbotConfig::load_or_default(config_path).context("Could not load configuration")?;
    let backend = OllamaClient::new(&config.ollama_host)?;
    let models = backend.list_models().await?;

    println!("Models available at {}:", backend.host());
    for model in &models {
        let marker = if *model == config.model { " (configured)" } else { "" };
        println!("  - {}{}", model, marker);
    }
    if models.is_empty() {
        println!("  (none)");
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_flags_override_defaults() {
        let args = RunArgs {
            model: Some("llama3.2".to_string()),
            log: Some(PathBuf::from("/tmp/out.txt")),
            confirm: true,
            ..RunArgs::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.log_path, "/tmp/out.txt");
        assert_eq!(config.mode, SessionMode::Confirmed);
        assert!(!config.headless);
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let args = RunArgs {
            config: Some(PathBuf::from("/nonexistent/matchbot.yaml")),
            ..RunArgs::default()
        };
        let err = resolve_config(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("Could not load configuration"));
    }
}
