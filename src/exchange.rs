use std::sync::Arc;

use futures::future::join_all;
use tokio::time::timeout;

use crate::config::{AppConfig, SourcePolicy};
use crate::error::ExchangeError;
use crate::gemini::{Content, ModelClient, Part};
use crate::models::{ExchangeResult, Role, Source, Turn};
use crate::providers::SourceProvider;
use crate::sources;

/// Response policy sent with every request. Static configuration, never
/// computed per call.
const SYSTEM_INSTRUCTION: &str = "\
Você é um teólogo católico especialista e assistente pastoral. Seu objetivo é fornecer respostas precisas, caridosas e fiéis baseadas na Doutrina da Igreja Católica.

Diretrizes:
1. **Fontes Confiáveis**: Baseie suas respostas estritamente no Magistério da Igreja, nas Sagradas Escrituras, no Catecismo da Igreja Católica (CIC), em documentos papais e conciliares, e em sites confiáveis como vatican.va.
2. **Clareza e Caridade**: Explique conceitos teológicos complexos de forma acessível, mas sem diluir a verdade. Mantenha um tom respeitoso e pastoral.
3. **Estrutura**: Use parágrafos claros. Se citar o Catecismo ou a Bíblia, forneça a referência (ex: CIC 1234, Jo 3, 16).

Se a pergunta não for sobre a fé, moral ou doutrina católica, redirecione gentilmente o usuário para o tema apropriado, relacionando-o com a visão católica se possível, ou decline educadamente.";

const FALLBACK_ANSWER: &str = "Desculpe, não consegui formular uma resposta no momento.";

/// Public entry point of the service: one prompt plus prior turns in, one
/// settled answer-with-sources out. Stateless between calls.
#[derive(Clone)]
pub struct ExchangeService {
    config: AppConfig,
    model: Arc<dyn ModelClient>,
    providers: Vec<Arc<dyn SourceProvider>>,
}

impl ExchangeService {
    pub fn new(
        config: AppConfig,
        model: Arc<dyn ModelClient>,
        providers: Vec<Arc<dyn SourceProvider>>,
    ) -> Self {
        Self {
            config,
            model,
            providers,
        }
    }

    pub async fn exchange(
        &self,
        prompt: &str,
        history: &[Turn],
    ) -> Result<ExchangeResult, ExchangeError> {
        if self.config.gemini.api_key.is_none() {
            return Err(ExchangeError::Configuration);
        }

        let contents = build_contents(prompt, history);

        // The model call and the provider fan-out hit different endpoints;
        // running them under one join bounds latency to the slower of the two.
        let model_call = self.model.generate(SYSTEM_INSTRUCTION, contents);
        let provider_call = self.gather_fallback_sources(prompt);
        let (reply, fallback_sources) = tokio::join!(model_call, provider_call);

        let reply = reply.map_err(|err| {
            tracing::error!("model invocation failed: {err:#}");
            ExchangeError::Upstream(err)
        })?;

        let text = reply
            .text
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string());
        let primary = sources::normalize(&reply.grounding_chunks);
        let sources = resolve_sources(primary, fallback_sources, self.config.source_policy);

        Ok(ExchangeResult { text, sources })
    }

    /// Runs every configured provider concurrently, each behind its own
    /// timeout and error boundary. A failing or slow provider contributes
    /// zero sources; it never fails the exchange.
    async fn gather_fallback_sources(&self, query: &str) -> Vec<Source> {
        if self.providers.is_empty() {
            return Vec::new();
        }

        let budget = self.config.provider_timeout;
        let calls = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let query = query.to_string();
            async move {
                match timeout(budget, provider.provide(&query)).await {
                    Ok(Ok(sources)) => sources,
                    Ok(Err(err)) => {
                        tracing::warn!(
                            provider = provider.name(),
                            "source provider failed: {err:#}"
                        );
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::warn!(
                            provider = provider.name(),
                            "source provider timed out after {budget:?}"
                        );
                        Vec::new()
                    }
                }
            }
        });

        join_all(calls).await.into_iter().flatten().collect()
    }
}

/// Maps the accumulated history in order, then appends the new prompt as the
/// final `user` turn. Full history is forwarded every call; there is no
/// truncation window.
pub fn build_contents(prompt: &str, history: &[Turn]) -> Vec<Content> {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|turn| Content {
            role: turn.role.as_str(),
            parts: vec![Part {
                text: turn.text.clone(),
            }],
        })
        .collect();

    contents.push(Content {
        role: Role::User.as_str(),
        parts: vec![Part {
            text: prompt.to_string(),
        }],
    });

    contents
}

fn resolve_sources(
    primary: Vec<Source>,
    fallback: Vec<Source>,
    policy: SourcePolicy,
) -> Vec<Source> {
    let merged = match policy {
        SourcePolicy::FallbackOnly if !primary.is_empty() => primary,
        _ => primary.into_iter().chain(fallback).collect(),
    };
    sources::dedup_by_uri(merged)
}
