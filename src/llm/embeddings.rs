use super::{BackendError, EmbeddingBackend};
use crate::config::Config;
use crate::http::build_client;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for an OpenAI-compatible `/embeddings` endpoint, such as a local
/// sentence-transformers server.
pub struct HttpEmbedder {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbedder {
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let base_url = config
            .embedding_api_url
            .as_deref()
            .ok_or(BackendError::NotConfigured("EMBEDDING_API_URL"))?;
        let http = build_client(config.analysis_timeout)
            .map_err(|err| BackendError::Init(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{base_url}/embeddings"),
            api_key: config.embedding_api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.http.post(&self.endpoint).json(&EmbedRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Http(format!("HTTP {}", response.status())));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;

        let mut data = payload.data;
        // Servers may answer out of order when `index` is present.
        data.sort_by_key(|item| item.index.unwrap_or(usize::MAX));
        if data.len() != texts.len() {
            return Err(BackendError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder_for(server: &MockServer) -> HttpEmbedder {
        let config = Config {
            embedding_api_url: Some(format!("{}/v1", server.uri())),
            ..Config::default()
        };
        HttpEmbedder::from_config(&config).expect("embedder")
    }

    #[tokio::test]
    async fn embed_orders_vectors_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let vectors = embedder_for(&server)
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .expect("embed");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_rejects_short_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let err = embedder_for(&server)
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .expect_err("short batch");
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn embed_of_nothing_skips_the_network() {
        let config = Config {
            embedding_api_url: Some("http://127.0.0.1:9/v1".into()),
            ..Config::default()
        };
        let embedder = HttpEmbedder::from_config(&config).expect("embedder");
        assert!(embedder.embed(&[]).await.expect("empty").is_empty());
    }
}
