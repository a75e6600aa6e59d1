use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One property record as it moves through the pipeline.
///
/// Source fields come from the upstream feed and are read leniently: a null or
/// oddly typed field falls back to its default instead of rejecting the record.
/// The `Option` fields further down are filled in stage by stage and are
/// omitted from JSON while unset. Fields the pipeline does not know about are
/// carried along in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Listing {
    /// Whatever identifier the source uses; usually an integer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_images")]
    pub images: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub clean_description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_norm: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub embedding: Option<Vec<f32>>,
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis_summary: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Upstream feeds are loose about numbers, so a price may arrive as text or
/// something stranger. Only the preprocessor decides whether it is usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(f64),
    Text(String),
    Other(Value),
}

impl Price {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Price::Amount(value) => Some(*value),
            Price::Text(raw) => raw.trim().parse::<f64>().ok(),
            Price::Other(_) => None,
        }
    }
}

/// Strings pass through, null becomes empty, other scalars keep their JSON text.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Accepts an array of anything; null means none and a lone value is wrapped.
fn lenient_images<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Derived fields sent by the source are kept only when they have the right shape.
fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPipelineRequest {
    /// `"mock"` skips the upstream feed; anything else queries it.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub max_items: Option<i64>,
    /// Overrides `LLM_ENABLED` when present.
    #[serde(default)]
    pub run_llm: Option<bool>,
    #[serde(default)]
    pub include_advice: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineCounts {
    pub fetched: usize,
    pub processed: usize,
    pub analyzed: usize,
    pub recommended: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPipelineResponse {
    pub status: RunStatus,
    pub counts: PipelineCounts,
    pub sample: Vec<Listing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Advice {
    Empty {
        message: String,
    },
    Summary {
        count: usize,
        top_recommendations: Vec<Recommendation>,
        note: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: Option<Value>,
    pub title: String,
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
