use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shopwise_core::config::{LlmConfig, LlmProvider};

use crate::conversation::Message;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> Result<String>;
}

/// Chat client for any endpoint speaking the `/v1/chat/completions` dialect
/// (OpenAI itself, Ollama, local gateways).
pub struct OpenAiCompatibleClient {
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    temperature: f32,
    client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let client =
            Client::builder().timeout(timeout).build().context("failed to build HTTP client")?;
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/');
        let base_url = base_url.strip_suffix("/v1").unwrap_or(base_url).to_string();

        Ok(Self { base_url, model: model.into(), api_key, temperature: 0.2, client })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = match config.provider {
            LlmProvider::OpenAi => {
                config.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string())
            }
            LlmProvider::Ollama => config
                .base_url
                .clone()
                .ok_or_else(|| anyhow!("llm.base_url is required for the ollama provider"))?,
            LlmProvider::Rules => bail!("the rules provider does not use a language model"),
        };

        Self::new(
            base_url,
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body<'a>(
        &'a self,
        system_prompt: &'a str,
        messages: &'a [Message],
    ) -> ChatRequest<'a> {
        let mut chat = Vec::with_capacity(messages.len() + 1);
        chat.push(ChatMessage { role: "system", content: system_prompt });
        chat.extend(messages.iter().map(|message| ChatMessage {
            role: message.role.as_str(),
            content: &message.content,
        }));

        ChatRequest { model: &self.model, messages: chat, temperature: self.temperature }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system_prompt: &str, messages: &[Message]) -> Result<String> {
        let body = self.request_body(system_prompt, messages);
        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat completion returned {status}: {body}");
        }

        let body = response.text().await.context("failed to read chat completion body")?;
        parse_completion(&body)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("chat completion body is not valid JSON")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat completion contained no message content"))
}
