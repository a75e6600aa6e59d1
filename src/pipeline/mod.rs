pub mod advisor;
pub mod analyzer;
pub mod fetcher;
pub mod preprocessor;
pub mod recommender;

use crate::config::Config;
use crate::http::build_client;
use crate::llm::{BackendProvider, ConfiguredBackends};
use crate::models::{
    Listing, PipelineCounts, RunPipelineRequest, RunPipelineResponse, RunStatus,
};
use analyzer::Analyzer;
use fetcher::{FetchSource, Fetcher};
use std::{future::Future, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_MAX_ITEMS: i64 = 10;
/// Largest batch a single run will fetch or synthesize.
pub const MAX_ITEMS_LIMIT: i64 = 1_000;
pub const SAMPLE_SIZE: usize = 3;
pub const COLLABORATORS_MISSING: &str = "Pipeline modules missing. Deploy incomplete.";

/// Fetch → preprocess → analyze → recommend, run once per request.
///
/// Holds only immutable collaborators, so clones are cheap and concurrent
/// runs never share listing state.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    backends: Arc<dyn BackendProvider>,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        backends: Arc<dyn BackendProvider>,
    ) -> Result<Self, PipelineError> {
        let http = build_client(config.fetch_timeout)
            .map_err(|err| PipelineError::internal("fetch", err.to_string()))?;
        let fetcher = Fetcher::new(http, config.owl_api_url.clone());
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            backends,
        })
    }

    pub fn from_config(config: Arc<Config>) -> Result<Self, PipelineError> {
        let backends = Arc::new(ConfiguredBackends::new(config.clone()));
        Self::new(config, backends)
    }

    pub async fn run(
        &self,
        request: RunPipelineRequest,
    ) -> Result<RunPipelineResponse, PipelineError> {
        let run_id = Uuid::new_v4();
        let run_llm = request.run_llm.unwrap_or(self.config.llm_enabled);
        let max_items = bounded_max_items(request.max_items)?;
        let source = FetchSource::parse(request.source.as_deref());
        info!(
            target = "owlow.pipeline",
            %run_id,
            source = request.source.as_deref().unwrap_or("api"),
            max_items,
            run_llm,
            "starting pipeline"
        );

        let fetched = self
            .capture_stage(run_id, "fetch", async {
                Ok(self.fetcher.fetch(source, max_items).await)
            })
            .await?;
        let fetched_count = fetched.len();

        let processed = self
            .capture_stage(run_id, "preprocess", async {
                preprocessor::transform(fetched)
            })
            .await?;
        let processed_count = processed.len();

        let analyzer = Analyzer::new(
            run_llm,
            self.backends.clone(),
            self.config.analysis_timeout,
        );
        let analyzed = self
            .capture_stage(run_id, "analyze", async {
                Ok(analyzer.analyze(processed).await)
            })
            .await?;
        let analyzed_count = analyzed.len();

        let recommended = self
            .capture_stage(run_id, "recommend", async {
                Ok(recommender::recommend(analyzed))
            })
            .await?;

        let advice = request
            .include_advice
            .then(|| advisor::summarize(&recommended, advisor::DEFAULT_TOP_N));

        let counts = PipelineCounts {
            fetched: fetched_count,
            processed: processed_count,
            analyzed: analyzed_count,
            recommended: recommended.len(),
        };
        info!(target = "owlow.pipeline", %run_id, ?counts, "pipeline completed");

        Ok(RunPipelineResponse {
            status: RunStatus::Completed,
            counts,
            sample: recommended.into_iter().take(SAMPLE_SIZE).collect(),
            advice,
        })
    }

    async fn capture_stage<Fut>(
        &self,
        run_id: Uuid,
        name: &'static str,
        fut: Fut,
    ) -> Result<Vec<Listing>, PipelineError>
    where
        Fut: Future<Output = Result<Vec<Listing>, PipelineError>>,
    {
        let started = Instant::now();
        let listings = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms, listings.len());
        info!(
            target = "owlow.pipeline",
            %run_id,
            stage = name,
            elapsed_ms = elapsed_ms as u64,
            "stage finished"
        );
        Ok(listings)
    }
}

/// Absent means the default, negative means zero, and anything above
/// `MAX_ITEMS_LIMIT` is rejected.
fn bounded_max_items(requested: Option<i64>) -> Result<usize, PipelineError> {
    let requested = requested.unwrap_or(DEFAULT_MAX_ITEMS);
    if requested > MAX_ITEMS_LIMIT {
        return Err(PipelineError::invalid_input(
            "request",
            format!("max_items must be at most {MAX_ITEMS_LIMIT}, got {requested}"),
        ));
    }
    Ok(requested.max(0) as usize)
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    /// The deployment could not assemble its pipeline.
    pub fn collaborators_missing() -> Self {
        Self::internal("pipeline", COLLABORATORS_MISSING)
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::StaticBackends;
    use crate::llm::{BackendError, TextGenBackend};
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_config() -> Arc<Config> {
        Arc::new(Config {
            owl_api_url: "http://127.0.0.1:9/api/listings".into(),
            ..Config::default()
        })
    }

    fn pipeline(config: Arc<Config>) -> Pipeline {
        Pipeline::new(config, Arc::new(StaticBackends::default())).expect("pipeline")
    }

    struct FixedTextGen;

    #[async_trait]
    impl TextGenBackend for FixedTextGen {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, BackendError> {
            Ok("Good value.".into())
        }
    }

    fn llm_pipeline(llm_enabled: bool) -> Pipeline {
        let config = Arc::new(Config {
            llm_enabled,
            ..(*offline_config()).clone()
        });
        let backends = StaticBackends {
            text_gen: Some(Arc::new(FixedTextGen)),
            embedder: None,
        };
        Pipeline::new(config, Arc::new(backends)).expect("pipeline")
    }

    fn request(max_items: Option<i64>, run_llm: Option<bool>) -> RunPipelineRequest {
        RunPipelineRequest {
            max_items,
            run_llm,
            ..RunPipelineRequest::default()
        }
    }

    #[tokio::test]
    async fn unreachable_source_still_completes_with_defaults() {
        let resp = pipeline(offline_config())
            .run(RunPipelineRequest::default())
            .await
            .expect("run");
        assert_eq!(resp.status, RunStatus::Completed);
        assert_eq!(
            resp.counts,
            PipelineCounts {
                fetched: 10,
                processed: 10,
                analyzed: 10,
                recommended: 10,
            }
        );
        assert_eq!(resp.sample.len(), SAMPLE_SIZE);
        // Mock prices rise with id, so the cheapest come first.
        let ids: Vec<_> = resp.sample.iter().map(|l| l.id.clone()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]);
        assert!(resp.advice.is_none());
    }

    #[tokio::test]
    async fn small_batch_without_backends_is_price_scored() {
        let resp = pipeline(offline_config())
            .run(request(Some(3), Some(false)))
            .await
            .expect("run");
        assert_eq!(resp.counts.fetched, 3);
        assert_eq!(resp.counts.recommended, 3);
        for listing in &resp.sample {
            assert!(listing.score.is_some());
            assert!(listing.embedding.is_none());
            assert!(listing.analysis_summary.is_none());
            assert!(listing.clean_description.is_some());
        }
    }

    #[tokio::test]
    async fn unset_run_llm_follows_llm_enabled() {
        let resp = llm_pipeline(true)
            .run(request(Some(2), None))
            .await
            .expect("run");
        for listing in &resp.sample {
            assert_eq!(listing.analysis_summary.as_deref(), Some("Good value."));
        }

        let resp = llm_pipeline(false)
            .run(request(Some(2), None))
            .await
            .expect("run");
        assert!(resp.sample.iter().all(|l| l.analysis_summary.is_none()));
    }

    #[tokio::test]
    async fn explicit_run_llm_overrides_llm_enabled() {
        let resp = llm_pipeline(true)
            .run(request(Some(2), Some(false)))
            .await
            .expect("run");
        assert!(resp.sample.iter().all(|l| l.analysis_summary.is_none()));

        let resp = llm_pipeline(false)
            .run(request(Some(2), Some(true)))
            .await
            .expect("run");
        assert!(resp.sample.iter().all(|l| l.analysis_summary.is_some()));
    }

    #[tokio::test]
    async fn loose_upstream_records_flow_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "abc-1", "title": null, "description": "Corner unit!", "price": "90000",
                 "location": null, "images": [{"url": "a.jpg"}], "agent": "Ada"}
            ])))
            .mount(&server)
            .await;
        let config = Arc::new(Config {
            owl_api_url: format!("{}/api/listings", server.uri()),
            ..Config::default()
        });

        let resp = pipeline(config)
            .run(RunPipelineRequest::default())
            .await
            .expect("run");
        assert_eq!(resp.counts.fetched, 1);
        let listing = &resp.sample[0];
        assert_eq!(listing.id, Some(json!("abc-1")));
        assert_eq!(listing.clean_description.as_deref(), Some("corner unit"));
        assert_eq!(listing.extra.get("agent"), Some(&json!("Ada")));
        assert!(listing.score.is_some());
    }

    #[tokio::test]
    async fn negative_max_items_is_clamped_to_zero() {
        let resp = pipeline(offline_config())
            .run(request(Some(-5), None))
            .await
            .expect("run");
        assert_eq!(resp.counts.fetched, 0);
        assert_eq!(resp.counts.recommended, 0);
        assert!(resp.sample.is_empty());
    }

    #[tokio::test]
    async fn oversized_max_items_is_rejected_before_fetching() {
        for max_items in [MAX_ITEMS_LIMIT + 1, 1_000_000_000, i64::MAX] {
            let mut req = request(Some(max_items), None);
            req.source = Some("mock".into());
            let err = pipeline(offline_config())
                .run(req)
                .await
                .expect_err("too many items");
            assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
            assert_eq!(err.stage(), "request");
        }
    }

    #[tokio::test]
    async fn max_items_at_the_limit_is_served() {
        let mut req = request(Some(MAX_ITEMS_LIMIT), None);
        req.source = Some("mock".into());
        let resp = pipeline(offline_config()).run(req).await.expect("run");
        assert_eq!(resp.counts.fetched, MAX_ITEMS_LIMIT as usize);
        assert_eq!(resp.counts.recommended, MAX_ITEMS_LIMIT as usize);
    }

    #[test]
    fn max_items_bounds() {
        assert_eq!(bounded_max_items(None).expect("default"), 10);
        assert_eq!(bounded_max_items(Some(-3)).expect("negative"), 0);
        assert_eq!(bounded_max_items(Some(7)).expect("seven"), 7);
        assert!(bounded_max_items(Some(MAX_ITEMS_LIMIT + 1)).is_err());
    }

    #[tokio::test]
    async fn advice_is_opt_in() {
        let mut req = request(Some(4), None);
        req.include_advice = true;
        let resp = pipeline(offline_config()).run(req).await.expect("run");
        let advice = serde_json::to_value(resp.advice.expect("advice")).expect("json");
        assert_eq!(advice["count"], json!(4));
        assert_eq!(advice["top_recommendations"][0]["id"], json!(1));
    }

    #[tokio::test]
    async fn missing_upstream_price_fails_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "No price", "description": "Ask the agent"}
            ])))
            .mount(&server)
            .await;
        let config = Arc::new(Config {
            owl_api_url: format!("{}/api/listings", server.uri()),
            ..Config::default()
        });

        let err = pipeline(config)
            .run(RunPipelineRequest::default())
            .await
            .expect_err("missing price");
        assert_eq!(err.kind(), PipelineErrorKind::Internal);
        assert_eq!(err.stage(), "preprocess");
    }

    #[tokio::test]
    async fn mock_source_ignores_the_upstream_url() {
        let mut req = request(Some(2), None);
        req.source = Some("mock".into());
        let resp = pipeline(offline_config()).run(req).await.expect("run");
        assert_eq!(resp.counts.fetched, 2);
    }
}
