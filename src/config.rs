use std::env;
use std::time::Duration;

/// Environment variables checked, in order, for the model-service API key.
pub const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub site_filter: Option<String>,
    pub result_limit: usize,
}

impl SearchConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.engine_id.is_some()
    }
}

/// What to do with fallback-provider sources when the model response carries
/// its own grounding. `FallbackOnly` keeps provider output only when the
/// model supplied zero sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourcePolicy {
    FallbackOnly,
    AlwaysMerge,
}

impl SourcePolicy {
    pub fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" | "always_merge" => SourcePolicy::AlwaysMerge,
            _ => SourcePolicy::FallbackOnly,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub gemini: GeminiConfig,
    pub search: SearchConfig,
    pub source_policy: SourcePolicy,
    pub provider_timeout: Duration,
    pub static_sources: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("VERITAS_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            gemini: GeminiConfig {
                base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
                api_key: api_key_from_env(),
            },
            search: SearchConfig {
                api_key: non_empty_var("GOOGLE_SEARCH_API_KEY"),
                engine_id: non_empty_var("GOOGLE_SEARCH_ENGINE_ID"),
                site_filter: non_empty_var("GOOGLE_SEARCH_SITE_FILTER"),
                result_limit: env::var("SEARCH_RESULT_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            },
            source_policy: env::var("SOURCE_FALLBACK_POLICY")
                .map(|v| SourcePolicy::from_env_value(&v))
                .unwrap_or(SourcePolicy::FallbackOnly),
            provider_timeout: Duration::from_millis(
                env::var("SOURCE_PROVIDER_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(4_000),
            ),
            static_sources: env::var("VERITAS_STATIC_SOURCES")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(true),
        }
    }
}

fn api_key_from_env() -> Option<String> {
    API_KEY_VARS.iter().find_map(|name| non_empty_var(name))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
