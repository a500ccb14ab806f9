use std::collections::HashSet;

use crate::gemini::{ChunkSite, GroundingChunk};
use crate::models::Source;

/// Title used when a citation fragment carries a usable URI but no title.
pub const DEFAULT_SOURCE_TITLE: &str = "Fonte Externa";

/// Anything that can surface a citation: an optional URI plus an optional
/// human-readable title. Grounding payloads arrive in several shapes; the
/// normalizer only ever sees this capability.
pub trait CitationFragment {
    fn uri(&self) -> Option<&str>;
    fn title(&self) -> Option<&str>;
}

impl CitationFragment for GroundingChunk {
    fn uri(&self) -> Option<&str> {
        cited_site(self).and_then(|site| site.uri.as_deref())
    }

    fn title(&self) -> Option<&str> {
        cited_site(self).and_then(|site| site.title.as_deref())
    }
}

// The title must come from the same sub-object that supplied the uri.
fn cited_site(chunk: &GroundingChunk) -> Option<&ChunkSite> {
    chunk
        .web
        .as_ref()
        .filter(|site| has_uri(site))
        .or_else(|| chunk.retrieved_context.as_ref().filter(|site| has_uri(site)))
}

fn has_uri(site: &ChunkSite) -> bool {
    site.uri.as_deref().is_some_and(|uri| !uri.trim().is_empty())
}

/// Converts raw citation fragments into sources, in encounter order,
/// skipping fragments without a URI and dropping repeated URIs.
pub fn normalize<F: CitationFragment>(fragments: &[F]) -> Vec<Source> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut sources = Vec::new();

    for fragment in fragments {
        let Some(uri) = fragment.uri().map(str::trim).filter(|uri| !uri.is_empty()) else {
            continue;
        };
        if !seen.insert(uri.to_string()) {
            continue;
        }

        let title = fragment
            .title()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_SOURCE_TITLE);

        sources.push(Source {
            uri: uri.to_string(),
            title: title.to_string(),
        });
    }

    sources
}

/// Drops every source whose `uri` was already seen earlier in the sequence.
pub fn dedup_by_uri(sources: Vec<Source>) -> Vec<Source> {
    let mut seen: HashSet<String> = HashSet::new();
    sources
        .into_iter()
        .filter(|source| seen.insert(source.uri.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeFragment {
        uri: Option<&'static str>,
        title: Option<&'static str>,
    }

    impl CitationFragment for FakeFragment {
        fn uri(&self) -> Option<&str> {
            self.uri
        }

        fn title(&self) -> Option<&str> {
            self.title
        }
    }

    fn fragment(uri: Option<&'static str>, title: Option<&'static str>) -> FakeFragment {
        FakeFragment { uri, title }
    }

    #[test]
    fn keeps_first_seen_order_and_drops_repeats() {
        let fragments = vec![
            fragment(Some("https://a.example"), Some("A")),
            fragment(Some("https://b.example"), Some("B")),
            fragment(Some("https://a.example"), Some("A again")),
            fragment(Some("https://c.example"), Some("C")),
        ];

        let sources = normalize(&fragments);
        let uris: Vec<&str> = sources.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
        assert_eq!(sources[0].title, "A");
    }

    #[test]
    fn skips_fragments_without_uri() {
        let fragments = vec![
            fragment(None, Some("no uri")),
            fragment(Some("  "), Some("blank uri")),
            fragment(Some("https://kept.example"), None),
        ];

        let sources = normalize(&fragments);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].uri, "https://kept.example");
    }

    #[test]
    fn missing_title_gets_default() {
        let sources = normalize(&[fragment(Some("https://a.example"), None)]);
        assert_eq!(sources[0].title, DEFAULT_SOURCE_TITLE);

        let sources = normalize(&[fragment(Some("https://a.example"), Some("  "))]);
        assert_eq!(sources[0].title, DEFAULT_SOURCE_TITLE);
    }

    #[test]
    fn grounding_chunk_exposes_either_shape() {
        let chunks = vec![
            GroundingChunk {
                web: Some(ChunkSite {
                    uri: Some("https://web.example".to_string()),
                    title: Some("Web".to_string()),
                }),
                retrieved_context: None,
            },
            GroundingChunk {
                web: None,
                retrieved_context: Some(ChunkSite {
                    uri: Some("https://ctx.example".to_string()),
                    title: None,
                }),
            },
            GroundingChunk::default(),
        ];

        let sources = normalize(&chunks);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].uri, "https://web.example");
        assert_eq!(sources[1].uri, "https://ctx.example");
        assert_eq!(sources[1].title, DEFAULT_SOURCE_TITLE);
    }

    #[test]
    fn dedup_preserves_first_occurrence() {
        let sources = vec![
            Source {
                uri: "https://a.example".to_string(),
                title: "first".to_string(),
            },
            Source {
                uri: "https://a.example".to_string(),
                title: "second".to_string(),
            },
            Source {
                uri: "https://b.example".to_string(),
                title: "third".to_string(),
            },
        ];

        let deduped = dedup_by_uri(sources);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
        assert_eq!(deduped[1].uri, "https://b.example");
    }
}
