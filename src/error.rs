use thiserror::Error;

/// Failure taxonomy for a single exchange. Fallback-provider failures are
/// not represented here; they are contained by the orchestrator and degrade
/// to an empty source list.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("no Gemini API key configured; set GEMINI_API_KEY (or GOOGLE_API_KEY / API_KEY)")]
    Configuration,

    #[error("model invocation failed")]
    Upstream(#[from] anyhow::Error),
}
