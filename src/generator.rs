//! # Query Generator
//!
//! Turns an instruction plus the current schema description into query text.
//! The pipeline only depends on [`QueryGenerator`]; [`ChatGenerator`] is the
//! implementation backed by an OpenAI-compatible chat-completions endpoint.
use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GENERATOR_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_GENERATOR_MODEL: &str = "mistral-small-2503";

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("generator request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("generator answered with status {0}: {1}")]
    StatusError(u16, String),

    #[error("generator returned no query text")]
    EmptyResponse,

    #[error("generator API key is not configured")]
    MissingApiKey,

    #[error("{0}")]
    Failed(String),
}

/// Produces query text for an instruction, given the schema catalog.
///
/// The returned text may still carry fences or labels; the executor strips them.
pub trait QueryGenerator: Send + Sync {
    fn generate(&self, instruction: &str, schema: &str) -> Result<String, GeneratorError>;
}

impl<F> QueryGenerator for F
where
    F: Fn(&str, &str) -> Result<String, GeneratorError> + Send + Sync,
{
    fn generate(&self, instruction: &str, schema: &str) -> Result<String, GeneratorError> {
        self(instruction, schema)
    }
}

/// Connection settings of a [`ChatGenerator`].
#[derive(Clone, Debug)]
pub struct ChatGeneratorConfig {
    /// Base URL; `/chat/completions` is appended
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ChatGeneratorConfig {
    fn default() -> Self {
        ChatGeneratorConfig {
            url: DEFAULT_GENERATOR_URL.to_owned(),
            model: DEFAULT_GENERATOR_MODEL.to_owned(),
            temperature: 0.0,
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
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
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking chat-completions client. One request per call, no retries.
pub struct ChatGenerator {
    client: reqwest::blocking::Client,
    config: ChatGeneratorConfig,
}

impl ChatGenerator {
    pub fn new(config: ChatGeneratorConfig) -> Result<ChatGenerator, GeneratorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(ChatGenerator { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.url.trim_end_matches('/'))
    }
}

impl QueryGenerator for ChatGenerator {
    fn generate(&self, instruction: &str, schema: &str) -> Result<String, GeneratorError> {
        let api_key = self.config.api_key.as_deref().ok_or(GeneratorError::MissingApiKey)?;
        let prompt = build_prompt(instruction, schema);
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![ChatMessage { role: "user", content: &prompt }],
        };

        log::debug!("Request query from {} ({})", self.endpoint(), self.config.model);
        let response = self.client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GeneratorError::StatusError(status.as_u16(), body));
        }

        let response: ChatResponse = response.json()?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(GeneratorError::EmptyResponse)
    }
}

/// Prompt sent to the model: fixed rules, the schema catalog and the instruction.
pub fn build_prompt(instruction: &str, schema: &str) -> String {
    format!(
        "You are a SQL assistant for DuckDB.\n\
         Write valid queries based only on the schema below.\n\
         \n\
         # Rules\n\
         1. Use only tables and columns that exist in the schema.\n\
         2. When table or column names are ambiguous, pick the closest match in the schema.\n\
         3. Never invent names that are not in the schema.\n\
         4. Answer with the SQL only, without explanations or comments.\n\
         5. Do not put backslashes before underscores.\n\
         6. Give every returned column an alias.\n\
         7. Render every date column as DD/MM/YYYY with strftime(column, '%d/%m/%Y').\n\
         \n\
         # Schema\n\
         {schema}\n\
         \n\
         # Instruction\n\
         {instruction}\n"
    )
}
