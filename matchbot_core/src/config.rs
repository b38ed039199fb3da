//! Run configuration, loaded from an optional YAML file.

use crate::browser::Locator;
use crate::candidate_log::DEFAULT_LOG_PATH;
use crate::extraction::{ProfileExtractor, DEFAULT_PROFILE_XPATH};
use crate::oracle::DEFAULT_OLLAMA_HOST;
use crate::session::{SessionConfig, DEFAULT_ADVANCE_XPATH, DEFAULT_START_URL};
use crate::types::SessionMode;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "qwen2.5:32b";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchbotConfig {
    pub ollama_host: String,
    pub model: String,
    pub start_url: String,
    pub profile_xpath: String,
    pub advance_xpath: String,
    pub element_timeout_secs: u64,
    pub advance_settle_ms: u64,
    pub autonomous_delay_ms: u64,
    pub log_path: String,
    pub mode: SessionMode,
    pub headless: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_timeout_secs: Option<u64>,
}

impl Default for MatchbotConfig {
    fn default() -> Self {
        Self {
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            start_url: DEFAULT_START_URL.to_string(),
            profile_xpath: DEFAULT_PROFILE_XPATH.to_string(),
            advance_xpath: DEFAULT_ADVANCE_XPATH.to_string(),
            element_timeout_secs: 10,
            advance_settle_ms: 2000,
            autonomous_delay_ms: 1000,
            log_path: DEFAULT_LOG_PATH.to_string(),
            mode: SessionMode::Autonomous,
            headless: false,
            operator_timeout_secs: None,
            inference_timeout_secs: None,
        }
    }
}

impl MatchbotConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path.as_ref())?;
        let config: MatchbotConfig = serde_yaml::from_reader(BufReader::new(file))?;
        log::debug!("[config] Loaded {}: {:?}", path.as_ref().display(), config);
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        self.inference_timeout_secs.map(Duration::from_secs)
    }

    pub fn extractor(&self) -> ProfileExtractor {
        ProfileExtractor::new(Locator::xpath(&self.profile_xpath), self.element_timeout())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            start_url: self.start_url.clone(),
            mode: self.mode,
            advance_locator: Locator::xpath(&self.advance_xpath),
            advance_timeout: self.element_timeout(),
            advance_settle: Duration::from_millis(self.advance_settle_ms),
            autonomous_delay: Duration::from_millis(self.autonomous_delay_ms),
            operator_timeout: self.operator_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MatchbotConfig::default();
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert_eq!(config.log_path, "recommended_candidates.txt");
        assert_eq!(config.element_timeout(), Duration::from_secs(10));
        assert!(config.inference_timeout().is_none());

        let session = config.session_config();
        assert_eq!(session.mode, SessionMode::Autonomous);
        assert_eq!(session.autonomous_delay, Duration::from_secs(1));
        assert_eq!(session.advance_settle, Duration::from_secs(2));
        assert!(session.operator_timeout.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "model: llama3.2\nmode: confirmed\ninference_timeout_secs: 120").unwrap();

        let config = MatchbotConfig::load(file.path()).unwrap();
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.mode, SessionMode::Confirmed);
        assert_eq!(config.inference_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.start_url, DEFAULT_START_URL);
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "element_timeout_secs: [not, a, number]").unwrap();
        assert!(matches!(
            MatchbotConfig::load(file.path()),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MatchbotConfig::load("/nonexistent/matchbot.yaml"),
            Err(ConfigError::Io(_))
        ));
        assert!(MatchbotConfig::load_or_default(None).is_ok());
    }
}
