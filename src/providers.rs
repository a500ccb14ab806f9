use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::models::Source;
use crate::sources::DEFAULT_SOURCE_TITLE;

/// A best-effort citation strategy consulted alongside the model call.
/// Providers are independent: one failing or timing out never affects the
/// others or the exchange itself.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn provide(&self, query: &str) -> Result<Vec<Source>>;
}

/// Fixed list of canonical reference sites, independent of the query.
pub struct TrustedSourceList;

const TRUSTED_SOURCES: [(&str, &str); 4] = [
    ("https://www.vatican.va", "Vatican.va - A Santa Sé"),
    (
        "https://www.vatican.va/archive/cathechism_po/index_new/prima-pagina-cic_po.html",
        "Catecismo da Igreja Católica",
    ),
    ("https://www.bibliacatolica.com.br", "Bíblia Católica"),
    ("https://www.acidigital.com", "ACI Digital"),
];

#[async_trait]
impl SourceProvider for TrustedSourceList {
    fn name(&self) -> &'static str {
        "trusted_list"
    }

    async fn provide(&self, _query: &str) -> Result<Vec<Source>> {
        Ok(TRUSTED_SOURCES
            .iter()
            .map(|(uri, title)| Source {
                uri: (*uri).to_string(),
                title: (*title).to_string(),
            })
            .collect())
    }
}

/// Read-only lookup against the Google Programmable Search JSON API. Any
/// transport failure or unexpected payload degrades to an empty list.
pub struct WebSearchProvider {
    client: Client,
    config: SearchConfig,
}

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Deserialize, Default)]
struct SearchResp {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    link: Option<String>,
    title: Option<String>,
}

impl WebSearchProvider {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn search_query(&self, query: &str) -> String {
        match self.config.site_filter.as_deref() {
            Some(site) => format!("{query} site:{site}"),
            None => query.to_string(),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<Source>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .context("search api key not configured")?;
        let engine_id = self
            .config
            .engine_id
            .as_deref()
            .context("search engine id not configured")?;

        let limit = self.config.result_limit.max(1);
        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[
                ("key", api_key),
                ("cx", engine_id),
                ("q", &self.search_query(query)),
                ("num", &limit.to_string()),
            ])
            .send()
            .await
            .context("failed to call search endpoint")?;

        if response.status() != StatusCode::OK {
            anyhow::bail!("search endpoint returned {}", response.status());
        }

        let response = response
            .json::<SearchResp>()
            .await
            .context("failed to decode search response")?;

        Ok(sources_from_items(response.items, limit))
    }
}

#[async_trait]
impl SourceProvider for WebSearchProvider {
    fn name(&self) -> &'static str {
        "web_search"
    }

    async fn provide(&self, query: &str) -> Result<Vec<Source>> {
        match self.search(query).await {
            Ok(sources) => Ok(sources),
            Err(err) => {
                tracing::warn!("web search fallback failed: {err:#}");
                Ok(Vec::new())
            }
        }
    }
}

fn sources_from_items(items: Vec<SearchItem>, limit: usize) -> Vec<Source> {
    items
        .into_iter()
        .filter_map(|item| {
            let uri = item.link.filter(|link| !link.trim().is_empty())?;
            let title = item
                .title
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string());
            Some(Source { uri, title })
        })
        .take(limit)
        .collect()
}
