//! Stock HTTP oracle speaking the OpenAI-compatible chat completions API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::oracle::client::{Oracle, OracleError, OracleResult};

/// Oracle backed by an OpenAI-compatible `/chat/completions` endpoint
/// (OpenAI, Groq, and most self-hosted gateways).
///
/// Configuration is immutable after construction; the client is cheap to
/// clone and safe to share across workers.
#[derive(Debug, Clone)]
pub struct ChatCompletionsOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsOracle {
    /// Create a client for the given API base URL, key, and model.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
        }
    }

    /// Set the sampling temperature (default 0.0 for reproducible output).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Use a preconfigured reqwest client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
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
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Oracle for ChatCompletionsOracle {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> OracleResult<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| OracleError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| OracleError::Transport(err.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .ok_or(OracleError::MalformedEnvelope)?
            .message
            .content
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(OracleError::Empty);
        }
        Ok(text)
    }
}
