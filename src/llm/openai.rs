use super::{BackendError, TextGenBackend};
use crate::config::Config;
use crate::http::build_client;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiChat {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or(BackendError::NotConfigured("OPENAI_API_KEY"))?;
        let http = build_client(config.analysis_timeout)
            .map_err(|err| BackendError::Init(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.openai_base_url.clone(),
            api_key,
            model: config.llm_model.clone(),
        })
    }
}

#[async_trait]
impl TextGenBackend for OpenAiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| BackendError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Http(format!("HTTP {}", response.status())));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| BackendError::InvalidResponse("missing message content".into()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
