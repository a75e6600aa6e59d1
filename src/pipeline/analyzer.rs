use crate::llm::{BackendProvider, EmbeddingBackend, TextGenBackend};
use crate::models::Listing;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{error, info, warn};

pub const SUMMARY_MAX_TOKENS: u32 = 40;
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis unavailable.";
const PROMPT_MAX_CHARS: usize = 2_000;

/// How a batch is analyzed, decided once per `analyze` call.
pub enum AnalysisMode {
    NoOp,
    Embedding(Arc<dyn EmbeddingBackend>),
    Summarize(Arc<dyn TextGenBackend>),
}

impl AnalysisMode {
    /// Probes backends in priority order: text generation (only when
    /// requested), then embeddings, then nothing.
    pub fn resolve(use_llm: bool, backends: &dyn BackendProvider) -> Self {
        if use_llm {
            match backends.text_gen() {
                Ok(backend) => {
                    info!(
                        target = "owlow.analyzer",
                        model = backend.model(),
                        "llm backend ready"
                    );
                    return AnalysisMode::Summarize(backend);
                }
                Err(err) => {
                    error!(target = "owlow.analyzer", error = %err, "failed to initialize llm");
                }
            }
        }
        match backends.embedder() {
            Ok(backend) => {
                info!(
                    target = "owlow.analyzer",
                    model = backend.model(),
                    "embedding backend ready"
                );
                AnalysisMode::Embedding(backend)
            }
            Err(err) => {
                warn!(target = "owlow.analyzer", error = %err, "embedding backend unavailable");
                AnalysisMode::NoOp
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnalysisMode::NoOp => "noop",
            AnalysisMode::Embedding(_) => "embedding",
            AnalysisMode::Summarize(_) => "summarize",
        }
    }
}

pub struct Analyzer {
    use_llm: bool,
    backends: Arc<dyn BackendProvider>,
    call_timeout: Duration,
}

impl Analyzer {
    pub fn new(
        use_llm: bool,
        backends: Arc<dyn BackendProvider>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            use_llm,
            backends,
            call_timeout,
        }
    }

    /// Returns the listings in input order, enriched according to the
    /// resolved mode. Backend trouble never fails the batch.
    pub async fn analyze(&self, listings: Vec<Listing>) -> Vec<Listing> {
        if listings.is_empty() {
            return listings;
        }

        let mode = AnalysisMode::resolve(self.use_llm, self.backends.as_ref());
        info!(
            target = "owlow.analyzer",
            mode = mode.name(),
            count = listings.len(),
            "analyzing listings"
        );
        match mode {
            AnalysisMode::Summarize(backend) => self.summarize(backend.as_ref(), listings).await,
            AnalysisMode::Embedding(backend) => self.embed(backend.as_ref(), listings).await,
            AnalysisMode::NoOp => {
                warn!(
                    target = "owlow.analyzer",
                    "no model available; returning unmodified listings"
                );
                listings
            }
        }
    }

    async fn summarize(
        &self,
        backend: &dyn TextGenBackend,
        listings: Vec<Listing>,
    ) -> Vec<Listing> {
        let mut analyzed = Vec::with_capacity(listings.len());
        for listing in listings {
            let description = listing.clean_description.as_deref().unwrap_or_default();
            let prompt = format!(
                "Analyze this property description briefly: {}",
                truncate_chars(description, PROMPT_MAX_CHARS)
            );
            let call = backend.generate(&prompt, SUMMARY_MAX_TOKENS);
            let summary = match timeout(self.call_timeout, call).await {
                Ok(Ok(text)) => text.trim().to_string(),
                Ok(Err(err)) => {
                    warn!(
                        target = "owlow.analyzer",
                        id = ?listing.id,
                        error = %err,
                        "llm analysis failed"
                    );
                    ANALYSIS_UNAVAILABLE.to_string()
                }
                Err(_) => {
                    warn!(
                        target = "owlow.analyzer",
                        id = ?listing.id,
                        "llm analysis timed out"
                    );
                    ANALYSIS_UNAVAILABLE.to_string()
                }
            };
            analyzed.push(Listing {
                analysis_summary: Some(summary),
                embedding: None,
                ..listing
            });
        }
        analyzed
    }

    async fn embed(
        &self,
        backend: &dyn EmbeddingBackend,
        listings: Vec<Listing>,
    ) -> Vec<Listing> {
        let texts: Vec<String> = listings
            .iter()
            .map(|listing| listing.clean_description.clone().unwrap_or_default())
            .collect();

        let vectors = match timeout(self.call_timeout, backend.embed(&texts)).await {
            Ok(Ok(vectors)) if vectors.len() == listings.len() => vectors,
            Ok(Ok(vectors)) => {
                warn!(
                    target = "owlow.analyzer",
                    expected = listings.len(),
                    received = vectors.len(),
                    "embedding count mismatch; returning unmodified listings"
                );
                return listings;
            }
            Ok(Err(err)) => {
                warn!(
                    target = "owlow.analyzer",
                    error = %err,
                    "embedding failed; returning unmodified listings"
                );
                return listings;
            }
            Err(_) => {
                warn!(
                    target = "owlow.analyzer",
                    "embedding timed out; returning unmodified listings"
                );
                return listings;
            }
        };

        listings
            .into_iter()
            .zip(vectors)
            .map(|(listing, vector)| Listing {
                embedding: Some(vector),
                analysis_summary: None,
                ..listing
            })
            .collect()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
