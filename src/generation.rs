//! Answer generation provider abstraction.
//!
//! [`Generator`] mirrors [`Embedder`](crate::embedding::Embedder): one boxed
//! seam to the language-generation service, so providers are swappable
//! without touching the engine. The shipped implementation targets
//! OpenAI-compatible `/v1/chat/completions` endpoints with the same bounded
//! retry/backoff discipline as the embedder.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

/// System instructions sent with every generation request.
pub const SYSTEM_PROMPT: &str = "You are a document assistant. Answer the user's \
question using the provided context passages. Each passage is labeled \
[Source: filename, Page: number]; refer to documents by their filenames when \
citing information. Base answers on the passages; if the needed information is \
not in them, say so plainly. When no passages are provided, answer from the \
conversation alone. Keep responses direct and well structured.";

/// A fully assembled generation request.
///
/// The engine renders retrieved passages into `context` and the bounded
/// conversation history into `history`; providers only lay the parts out in
/// their wire format.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub context: String,
    pub history: String,
    pub question: String,
}

impl Prompt {
    /// The user-role message body: context, question, then history.
    pub fn user_message(&self) -> String {
        format!(
            "Context:\n{}\n\nQuestion: {}\n\nConversation so far (may help):\n{}",
            self.context, self.question, self.history
        )
    }
}

/// Produces an answer for an assembled [`Prompt`].
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// One generation call. Retries happen inside; a returned error means the
    /// operation is aborted.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Generation provider for OpenAI-compatible chat completion APIs.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_retries: u32,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| Error::Config(format!("{} environment variable not set", config.api_key_env)))?;
        let base = config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com")
            .trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Generation(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl Generator for HttpGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user_message() },
            ],
        });

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, "retrying generation request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: ChatResponse = response
                            .json()
                            .await
                            .map_err(|e| Error::Generation(format!("invalid response: {}", e)))?;
                        return parsed
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content)
                            .ok_or_else(|| Error::Generation("empty response".into()));
                    }
                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(format!("generation API {}: {}", status, text));
                        continue;
                    }
                    return Err(Error::Generation(format!("generation API {}: {}", status, text)));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(Error::Generation(
            last_err.unwrap_or_else(|| "retries exhausted".to_string()),
        ))
    }
}
