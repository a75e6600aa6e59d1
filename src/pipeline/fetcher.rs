use crate::models::{Listing, Price};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Where a run pulls its listings from. `mock` skips the network entirely;
/// every other value queries the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Api,
    Mock,
}

impl FetchSource {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(source) if source.eq_ignore_ascii_case("mock") => FetchSource::Mock,
            _ => FetchSource::Api,
        }
    }
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("payload is not a JSON array")]
    NotAnArray,
    #[error("empty data returned from API")]
    Empty,
    #[error("listing does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

pub struct Fetcher {
    http: Client,
    api_url: String,
}

impl Fetcher {
    /// `http` should carry the fetch timeout.
    pub fn new(http: Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }

    /// Never fails: any upstream problem is logged and replaced by mock data.
    pub async fn fetch(&self, source: FetchSource, max_items: usize) -> Vec<Listing> {
        if source == FetchSource::Mock {
            return mock_listings(max_items);
        }
        match self.fetch_remote(max_items).await {
            Ok(listings) => {
                info!(target = "owlow.fetcher", count = listings.len(), "fetched listings");
                listings
            }
            Err(err) => {
                warn!(
                    target = "owlow.fetcher",
                    url = %self.api_url,
                    error = %err,
                    "falling back to mock data"
                );
                mock_listings(max_items)
            }
        }
    }

    async fn fetch_remote(&self, max_items: usize) -> Result<Vec<Listing>, FetchError> {
        let response = self.http.get(&self.api_url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let payload: Value = response.json().await?;
        let Value::Array(mut items) = payload else {
            return Err(FetchError::NotAnArray);
        };
        if items.is_empty() {
            return Err(FetchError::Empty);
        }
        items.truncate(max_items);
        Ok(serde_json::from_value(Value::Array(items))?)
    }
}

/// Deterministic stand-in listings with ids `1..=n` and rising prices.
pub fn mock_listings(n: usize) -> Vec<Listing> {
    (1..=n as i64)
        .map(|i| Listing {
            id: Some(Value::from(i)),
            title: format!("Cozy Apartment #{i}"),
            description: format!("Beautiful 2-bedroom apartment in city center, unit {i}."),
            price: Some(Price::Amount((50_000 + i * 1_000) as f64)),
            location: "Lagos".into(),
            images: Vec::new(),
            ..Listing::default()
        })
        .collect()
}
