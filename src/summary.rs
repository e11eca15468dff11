//! AI repository summaries: a provider abstraction, the Groq-backed
//! implementation, and the engine that assembles repository context into a
//! prompt and caches the responses.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::git::GitClient;
use crate::storage::JsonStore;
use crate::types::SummaryError;

/// Groq's OpenAI-compatible chat completions endpoint.
pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Model the dashboard ships with.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const DEFAULT_TEMPERATURE: f32 = 0.5;
const DEFAULT_MAX_TOKENS: u32 = 150;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Returned when the API answers but carries no usable text.
const NO_SUMMARY: &str = "No summary generated.";

/// How many changed files and commits go into the prompt.
const PROMPT_FILE_LIMIT: usize = 10;
const PROMPT_COMMIT_LIMIT: usize = 5;

/// Produces a short natural-language completion for a prompt.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SummaryError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for Groq's OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: GROQ_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl SummaryProvider for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String, SummaryError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .unwrap_or_else(|| NO_SUMMARY.to_string());
        Ok(text)
    }
}

/// Builds dashboard summaries: gathers repository context from git,
/// renders the prompt, asks the provider, and caches responses per
/// repository path so a repo is only ever summarized once.
pub struct SummaryEngine {
    provider: Arc<dyn SummaryProvider>,
    git: Arc<dyn GitClient>,
    store: Option<Arc<JsonStore>>,
}

impl SummaryEngine {
    pub fn new(provider: Arc<dyn SummaryProvider>, git: Arc<dyn GitClient>) -> Self {
        Self {
            provider,
            git,
            store: None,
        }
    }

    /// Groq-backed engine wired the way the dashboard configures it.
    /// Refuses when summaries are disabled or no key is available;
    /// `key_override` takes precedence over the configured key.
    pub fn from_config(
        config: &crate::config::AiConfig,
        key_override: Option<String>,
        git: Arc<dyn GitClient>,
    ) -> Result<Self, SummaryError> {
        if !config.enabled {
            return Err(SummaryError::Disabled);
        }
        let key = key_override
            .filter(|key| !key.is_empty())
            .or_else(|| config.resolved_api_key())
            .ok_or(SummaryError::MissingApiKey)?;
        let client = GroqClient::new(key)
            .with_model(config.model.clone())
            .with_sampling(config.temperature, config.max_tokens);
        Ok(Self::new(Arc::new(client), git))
    }

    /// Enables response caching through the persistent store.
    pub fn with_store(mut self, store: Arc<JsonStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn summarize(&self, repo: &Path) -> Result<String, SummaryError> {
        if let Some(store) = &self.store {
            if let Some(cached) = store.summary(repo) {
                debug!(repo = %repo.display(), "serving cached summary");
                return Ok(cached);
            }
        }

        let prompt = self.build_prompt(repo).await?;
        let text = self.provider.complete(&prompt).await?;

        if let Some(store) = &self.store {
            if let Err(err) = store.set_summary(repo, &text) {
                warn!(repo = %repo.display(), error = %err, "failed to cache summary");
            }
        }
        Ok(text)
    }

    async fn build_prompt(&self, repo: &Path) -> Result<String, SummaryError> {
        let (changes, commits, branch) = futures::try_join!(
            self.git.status(repo),
            self.git.recent_commits(repo, PROMPT_COMMIT_LIMIT),
            self.git.current_branch(repo),
        )?;

        let name = repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| repo.display().to_string());
        let file_list = changes
            .iter()
            .take(PROMPT_FILE_LIMIT)
            .map(|file| file.path.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let recent_commits = commits
            .iter()
            .map(|commit| commit.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!(
            "Summarize this git repository concisely (max 3 sentences).\n\
             Project Name: {name}\n\
             Current Branch: {branch}\n\
             Recent Files: {file_list}\n\
             Recent Commits:\n\
             {recent_commits}\n\n\
             Focus on the current state and purpose of the project."
        ))
    }
}
