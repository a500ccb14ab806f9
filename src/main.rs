use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use veritas::config::API_KEY_VARS;
use veritas::exchange::ExchangeService;
use veritas::gemini::GeminiClient;
use veritas::providers::{SourceProvider, TrustedSourceList, WebSearchProvider};
use veritas::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    if config.gemini.api_key.is_none() {
        tracing::warn!(
            "no Gemini API key found; set one of {:?} before sending chat requests",
            API_KEY_VARS
        );
    }

    let model = Arc::new(GeminiClient::new(config.gemini.clone()));

    let mut providers: Vec<Arc<dyn SourceProvider>> = Vec::new();
    if config.search.is_configured() {
        providers.push(Arc::new(WebSearchProvider::new(config.search.clone())));
    }
    if config.static_sources {
        providers.push(Arc::new(TrustedSourceList));
    }

    let exchange = ExchangeService::new(config.clone(), model, providers);
    run_server(&config.bind_addr, exchange).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
