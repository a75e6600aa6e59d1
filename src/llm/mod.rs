pub mod embeddings;
pub mod openai;

use crate::config::Config;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use embeddings::HttpEmbedder;
pub use openai::OpenAiChat;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not configured: {0} is unset")]
    NotConfigured(&'static str),
    #[error("initialization failed: {0}")]
    Init(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Short free-text generation, one prompt at a time.
#[async_trait]
pub trait TextGenBackend: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, BackendError>;
}

/// Batch text embedding. Implementations return one vector per input, in order.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn model(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError>;
}

/// Constructs analysis backends on demand. A construction error means the
/// capability is not available to this run.
pub trait BackendProvider: Send + Sync {
    fn text_gen(&self) -> Result<Arc<dyn TextGenBackend>, BackendError>;
    fn embedder(&self) -> Result<Arc<dyn EmbeddingBackend>, BackendError>;
}

/// Production wiring: HTTP backends built from process configuration.
pub struct ConfiguredBackends {
    config: Arc<Config>,
}

impl ConfiguredBackends {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl BackendProvider for ConfiguredBackends {
    fn text_gen(&self) -> Result<Arc<dyn TextGenBackend>, BackendError> {
        let chat = OpenAiChat::from_config(&self.config)?;
        Ok(Arc::new(chat))
    }

    fn embedder(&self) -> Result<Arc<dyn EmbeddingBackend>, BackendError> {
        let embedder = HttpEmbedder::from_config(&self.config)?;
        Ok(Arc::new(embedder))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_environment_offers_no_backends() {
        let backends = ConfiguredBackends::new(Arc::new(Config::default()));
        assert!(matches!(
            backends.text_gen(),
            Err(BackendError::NotConfigured("OPENAI_API_KEY"))
        ));
        assert!(matches!(
            backends.embedder(),
            Err(BackendError::NotConfigured("EMBEDDING_API_URL"))
        ));
    }

    #[test]
    fn configured_environment_builds_both_backends() {
        let config = Config {
            openai_api_key: Some("sk-test".into()),
            embedding_api_url: Some("http://127.0.0.1:9/v1".into()),
            ..Config::default()
        };
        let backends = ConfiguredBackends::new(Arc::new(config));
        let chat = backends.text_gen().ok().expect("text gen");
        assert_eq!(chat.model(), "gpt-4o-mini");
        let embedder = backends.embedder().ok().expect("embedder");
        assert_eq!(embedder.model(), "all-MiniLM-L6-v2");
    }
}
