//! Classification Oracle
//!
//! Builds the evaluation prompt for a profile, submits it to a language
//! model and parses the answer into a verdict.
//!
//! The model is used strictly as a classifier:
//! - It only sees the fixed prompt plus the verbatim profile text
//! - Its answer is parsed permissively (see [`crate::response_parser`])
//! - Transport failures are NOT recovered here; they end the run

use crate::response_parser::{parse_response, ParseOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Inference server unreachable at {host}: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("Model {model} not found. Available models: {available:?}")]
    ModelNotFound {
        model: String,
        available: Vec<String>,
    },

    #[error("Inference request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response from inference server: {0}")]
    InvalidResponse(String),

    #[error("Inference call exceeded {0:?}")]
    TimedOut(Duration),
}

/// The inference collaborator.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Identifiers of every model the backend can serve, in server order.
    async fn list_models(&self) -> Result<Vec<String>, OracleError>;

    /// Single, non-streaming completion.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, OracleError>;
}

// ============================================================
// OLLAMA HTTP BACKEND
// ============================================================

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// HTTP client for a local Ollama server.
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

impl OllamaClient {
    /// No client-side request timeout is set: generation can take minutes on
    /// large models. Bound it with [`ClassificationOracle::with_timeout`].
    pub fn new(host: &str) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| OracleError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn unreachable(&self, e: reqwest::Error) -> OracleError {
        OracleError::Unreachable {
            host: self.host.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>, OracleError> {
        let url = format!("{}/api/tags", self.host);
        log::debug!("[oracle] GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?
            .error_for_status()
            .map_err(|e| OracleError::RequestFailed(e.to_string()))?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        Ok(normalize_model_list(&tags.models))
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.host);
        log::debug!(
            "[oracle] POST {} model={} prompt_len={}",
            url,
            model,
            prompt.len()
        );

        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OracleError::RequestFailed(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                detail
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Collapses the server's model entries into plain identifiers.
///
/// Entries may be bare strings or objects carrying `model` and/or `name`;
/// `model` wins when both are present.
pub fn normalize_model_list(entries: &[serde_json::Value]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match entry {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("model")
                .or_else(|| map.get("name"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| entry.to_string()),
            other => other.to_string(),
        })
        .collect()
}

/// Startup check: the configured model must be served by the backend.
pub async fn verify_model(
    backend: &dyn InferenceBackend,
    model: &str,
) -> Result<Vec<String>, OracleError> {
    let available = backend.list_models().await?;

    if !available.iter().any(|m| m == model) {
        log::error!("[oracle] Model {} not in {:?}", model, available);
        return Err(OracleError::ModelNotFound {
            model: model.to_string(),
            available,
        });
    }

    log::info!("[oracle] Connected with model {}", model);
    Ok(available)
}

// ============================================================
// PROMPT
// ============================================================

/// Builds the evaluation prompt. The profile text is included verbatim.
pub fn build_prompt(profile_text: &str) -> String {
    format!(
        r#"You are screening cofounder profiles. Answer NO unless the profile shows CONCRETE, SPECIFIC EXPERIENCE in at least ONE of these two categories.

CATEGORY 1 - ROBOTICS (ANY KIND):
- Robotics of any kind counts, medical or not
- Robotics engineering jobs or robotics research
- Robots actually built (industrial, consumer, research, hobby)
- Robotics competitions, robotics coursework or a robotics degree
- Mechatronics, robot control systems, robot design

CATEGORY 2 - MEDICAL / BIOTECH / HEALTHCARE (ANY KIND):
- Jobs at healthcare, biotech, medical or pharma companies (title, company)
- Healthcare or medical products, apps or services that were built
- Clinical work (doctors, nurses, other providers, medical students)
- Founding or working at medtech, biotech or pharma startups
- Medical device development
- Bioinformatics or computational biology projects
- Digital health or AI-in-healthcare applications
- Biological or medical laboratory research
- Degrees in biomedical engineering, biotechnology, biology, medicine or related fields
- Drug development, clinical trials, medical research

RULES:
- Robotics alone is enough. Medical/biotech alone is enough.
- Saying "I'm interested in" or listing a topic under interests is NOT experience.
- Aspirational statements ("want to work in biotech") are NOT experience.
- General mechanical, electrical or software engineering is NOT experience unless applied to robotics or medicine/biotech.
- General AI or software work without a robotics or healthcare application is NOT experience.
- Wellness, fitness, meditation and nutrition apps are NOT experience.
- If you cannot point to a specific project, job, degree or accomplishment in one of the two categories, the answer MUST be NO.

Profile text:
{profile_text}

Respond in exactly this format:
NAME: [the person's name, or Unknown if not found]
EXPERIENCE: [YES or NO]
SUMMARY: [the specific experience found (job titles, companies, projects, degrees), or "No specific robotics or biotech/healthcare/medical experience found - only general interest mentioned"]
"#
    )
}

// ============================================================
// CLASSIFICATION ORACLE
// ============================================================

/// Classifies profile text with a fixed model.
pub struct ClassificationOracle<I: InferenceBackend> {
    backend: I,
    model: String,
    timeout: Option<Duration>,
}

impl<I: InferenceBackend> ClassificationOracle<I> {
    pub fn new(backend: I, model: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
            timeout: None,
        }
    }

    /// Bounds each inference round-trip. Without it the call may block forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn backend(&self) -> &I {
        &self.backend
    }

    pub async fn classify(&self, profile_text: &str) -> Result<ParseOutcome, OracleError> {
        let prompt = build_prompt(profile_text);

        let call = self.backend.generate(&self.model, &prompt);
        let raw = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| OracleError::TimedOut(limit))??,
            None => call.await?,
        };

        log::debug!("[oracle] Raw answer:\n{}", raw);

        let outcome = parse_response(&raw);
        if outcome.is_degraded() {
            log::warn!(
                "[oracle] Answer did not follow the protocol, defaulted fields: {:?}",
                outcome.missing()
            );
        }
        Ok(outcome)
    }
}

// ============================================================
// MOCK BACKEND
// ============================================================

/// Scripted backend: answers are returned in order, prompts are recorded.
pub struct MockInference {
    models: Vec<String>,
    answers: Mutex<VecDeque<Result<String, OracleError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockInference {
    pub fn new(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|m| m.to_string()).collect(),
            answers: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_answer(self, answer: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Ok(answer.to_string()));
        self
    }

    pub fn with_failure(self, error: OracleError) -> Self {
        self.answers.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceBackend for MockInference {
    async fn list_models(&self) -> Result<Vec<String>, OracleError> {
        Ok(self.models.clone())
    }

    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::RequestFailed("no scripted answer left".into())))
    }
}

#[async_trait]
impl<T: InferenceBackend + ?Sized> InferenceBackend for std::sync::Arc<T> {
    async fn list_models(&self) -> Result<Vec<String>, OracleError> {
        (**self).list_models().await
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, OracleError> {
        (**self).generate(model, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_model_list_shapes() {
        let entries = vec![
            json!({"name": "llama3.2:latest", "model": "llama3.2:latest", "size": 1}),
            json!({"name": "only-name"}),
            json!({"model": "only-model"}),
            json!("bare-string"),
            json!({"digest": "abc"}),
        ];
        let models = normalize_model_list(&entries);
        assert_eq!(models[0], "llama3.2:latest");
        assert_eq!(models[1], "only-name");
        assert_eq!(models[2], "only-model");
        assert_eq!(models[3], "bare-string");
        assert!(models[4].contains("abc"));
    }

    #[test]
    fn test_client_and_oracle_identity() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.host(), "http://localhost:11434");

        let oracle = ClassificationOracle::new(client, "qwen2.5:32b");
        assert_eq!(oracle.model(), "qwen2.5:32b");
        assert_eq!(oracle.backend().host(), "http://localhost:11434");
    }

    #[test]
    fn test_prompt_includes_profile_verbatim() {
        let text = "Built a <surgical> robot & \"more\"";
        let prompt = build_prompt(text);
        assert!(prompt.contains(text));
        assert!(prompt.contains("EXPERIENCE: [YES or NO]"));
        assert_eq!(prompt, build_prompt(text));
    }

    #[tokio::test]
    async fn test_verify_model_missing() {
        let backend = MockInference::new(&["llama3.2"]);
        let err = verify_model(&backend, "qwen2.5:32b").await.unwrap_err();
        match err {
            OracleError::ModelNotFound { model, available } => {
                assert_eq!(model, "qwen2.5:32b");
                assert_eq!(available, vec!["llama3.2".to_string()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_model_present() {
        let backend = MockInference::new(&["llama3.2", "qwen2.5:32b"]);
        let models = verify_model(&backend, "qwen2.5:32b").await.unwrap();
        assert_eq!(models.len(), 2);
    }

    #[tokio::test]
    async fn test_classify_passes_answer_through_parser() {
        let backend =
            MockInference::new(&["m"]).with_answer("NAME: Jane Doe\nEXPERIENCE: YES\nSUMMARY: Surgical robot");
        let oracle = ClassificationOracle::new(backend, "m");

        let outcome = oracle.classify("built a surgical robot for my thesis").await.unwrap();
        assert!(outcome.verdict().has_relevant_experience);
        assert_eq!(outcome.verdict().person_name, "Jane Doe");

        let prompts = oracle.backend().prompts.lock().unwrap();
        assert!(prompts[0].contains("built a surgical robot for my thesis"));
    }

    #[tokio::test]
    async fn test_classify_propagates_backend_failure() {
        let backend = MockInference::new(&["m"]).with_failure(OracleError::Unreachable {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            reason: "connection refused".to_string(),
        });
        let oracle = ClassificationOracle::new(backend, "m");
        assert!(matches!(
            oracle.classify("text").await,
            Err(OracleError::Unreachable { .. })
        ));
    }

    struct SlowBackend;

    #[async_trait]
    impl InferenceBackend for SlowBackend {
        async fn list_models(&self) -> Result<Vec<String>, OracleError> {
            Ok(vec![])
        }

        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_classify_timeout() {
        let oracle =
            ClassificationOracle::new(SlowBackend, "m").with_timeout(Some(Duration::from_secs(5)));
        assert!(matches!(
            oracle.classify("text").await,
            Err(OracleError::TimedOut(_))
        ));
    }
}
