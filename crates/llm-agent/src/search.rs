use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::Result;

pub const GOOGLE_BASE_URL: &str = "https://www.googleapis.com";

/// The Custom Search API returns at most ten results per request.
const MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google Custom Search client. Without both a key and an engine id every
/// search returns no results.
pub struct SearchClient {
    base_url: String,
    api_key: Option<String>,
    engine_id: Option<String>,
    client: Client,
}

impl SearchClient {
    pub fn new(api_key: Option<String>, engine_id: Option<String>) -> Self {
        Self::with_base_url(GOOGLE_BASE_URL, api_key, engine_id)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>, engine_id: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            engine_id: engine_id.filter(|e| !e.is_empty()),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.engine_id.is_some()
    }

    pub async fn search(&self, query: &str, num_results: u32) -> Result<Vec<SearchResult>> {
        let (Some(key), Some(cx)) = (&self.api_key, &self.engine_id) else {
            tracing::debug!("web search not configured; skipping");
            return Ok(Vec::new());
        };
        let num = num_results.clamp(1, MAX_RESULTS).to_string();

        let response = self
            .client
            .get(format!("{}/customsearch/v1", self.base_url))
            .query(&[("key", key.as_str()), ("cx", cx.as_str()), ("q", query), ("num", num.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&text).map_err(|source| LlmError::Parse {
            payload: text.clone(),
            source,
        })?;
        tracing::debug!(query, results = parsed.items.len(), "web search finished");
        Ok(parsed
            .items
            .into_iter()
            .map(|i| SearchResult {
                title: i.title,
                link: i.link,
                snippet: i.snippet,
            })
            .collect())
    }
}

/// Markdown bullet list of results, for inclusion in prompts.
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| {
            let snippet = r.snippet.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("- [{}]({}): {}", r.title, r.link, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn unconfigured_returns_nothing() {
        let client = SearchClient::new(None, Some("cx".into()));
        assert!(!client.is_configured());
        assert!(client.search("rust", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_caps_num_and_parses_items() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/customsearch/v1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("key".into(), "k".into()),
                Matcher::UrlEncoded("cx".into(), "engine".into()),
                Matcher::UrlEncoded("q".into(), "recipe apps".into()),
                Matcher::UrlEncoded("num".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"items":[{"title":"Paprika","link":"https://example.com/p","snippet":"Recipe\nmanager"}]}"#,
            )
            .create_async()
            .await;

        let client = SearchClient::with_base_url(&server.url(), Some("k".into()), Some("engine".into()));
        let results = client.search("recipe apps", 25).await.unwrap();
        mock.assert_async().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Paprika");
        assert_eq!(
            format_results(&results),
            "- [Paprika](https://example.com/p): Recipe manager"
        );
    }

    #[tokio::test]
    async fn http_errors_surface() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(403)
            .with_body("quota")
            .create_async()
            .await;

        let client = SearchClient::with_base_url(&server.url(), Some("k".into()), Some("e".into()));
        assert!(matches!(
            client.search("x", 3).await,
            Err(LlmError::Api { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn missing_items_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let client = SearchClient::with_base_url(&server.url(), Some("k".into()), Some("e".into()));
        assert!(client.search("x", 3).await.unwrap().is_empty());
    }
}
