use std::time::Duration;

pub const SERVICE_NAME: &str = "The Owlow Project";

const DEFAULT_SOURCE_URL: &str = "https://example.com/api/listings";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Process-wide settings, read once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    /// Upstream listings endpoint queried by the fetcher.
    pub owl_api_url: String,
    pub llm_enabled: bool,
    pub llm_model: String,
    /// OpenAI-compatible embeddings base URL; embedding analysis is off without it.
    pub embedding_api_url: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    /// Advisory image policy. Listings are not trimmed against it.
    pub max_image_size: u32,
    pub max_images: u32,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub fetch_timeout: Duration,
    pub analysis_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let flag = |key: &str| text(key).map(|value| parse_flag(&value)).unwrap_or(false);

        let fetch_secs = text("FETCH_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        let analysis_secs = text("LLM_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(fetch_secs);

        Self {
            openai_api_key: text("OPENAI_API_KEY"),
            openai_base_url: text("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            owl_api_url: text("OWL_API_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.into()),
            llm_enabled: flag("LLM_ENABLED"),
            llm_model: text("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            embedding_api_url: text("EMBEDDING_API_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            embedding_api_key: text("EMBEDDING_API_KEY"),
            embedding_model: text("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            max_image_size: text("MAX_IMAGE_SIZE")
                .and_then(|value| value.parse().ok())
                .unwrap_or(512),
            max_images: text("MAX_IMAGES")
                .and_then(|value| value.parse().ok())
                .unwrap_or(2),
            host: text("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: text("PORT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(8000),
            debug: flag("DEBUG"),
            fetch_timeout: Duration::from_secs(fetch_secs),
            analysis_timeout: Duration::from_secs(analysis_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
