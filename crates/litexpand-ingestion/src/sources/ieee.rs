//! IEEE Xplore Metadata API client.
//!
//! Endpoint: https://ieeexploreapi.ieee.org/api/v1/search/articles
//! Requires an API key.

use async_trait::async_trait;
use litexpand_common::SandboxClient as Client;
use tracing::{debug, instrument};

use crate::models::{PaperMatch, SourceKind};
use super::{non_empty, read_document, read_json, AcquisitionError, PaperSource};

const IEEE_SEARCH_URL: &str = "https://ieeexploreapi.ieee.org/api/v1/search/articles";

pub struct IeeeXploreClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl IeeeXploreClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: non_empty(api_key),
            base_url: IEEE_SEARCH_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl PaperSource for IeeeXploreClient {
    fn kind(&self) -> SourceKind {
        SourceKind::IeeeXplore
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self))]
    async fn search(&self, title: &str) -> Result<Option<PaperMatch>, AcquisitionError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let resp = self.client
            .get(&self.base_url)?
            .query(&[
                ("apikey", api_key),
                ("format", "json"),
                ("max_records", "1"),
                ("sort_order", "desc"),
                ("sort_field", "relevance"),
                ("querytext", title.trim()),
            ])
            .send()
            .await?;

        let json = read_json(resp).await?;
        Ok(article_to_match(&json))
    }

    async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let resp = self.client.fetch_document(url)?.send().await?;
        read_document(resp).await
    }
}

/// First article of a search response, if any records matched.
fn article_to_match(resp: &serde_json::Value) -> Option<PaperMatch> {
    let total = resp["total_records"]
        .as_u64()
        .or_else(|| resp["totalRecords"].as_u64())
        .unwrap_or(0);
    debug!(total, "IEEE Xplore search results");
    if total == 0 {
        return None;
    }

    let article = resp["articles"].as_array()?.first()?;
    let number = &article["article_number"];
    let source_id = number
        .as_str()
        .map(String::from)
        .or_else(|| number.as_u64().map(|n| n.to_string()))?;

    Some(PaperMatch {
        source_id,
        title: article["title"].as_str().unwrap_or("").to_string(),
        pdf_url: article["pdf_url"].as_str().map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_article_with_pdf() {
        let resp = json!({
            "total_records": 12,
            "articles": [{
                "article_number": "7780459",
                "title": "Deep Residual Learning for Image Recognition",
                "pdf_url": "https://ieeexplore.ieee.org/stamp/stamp.jsp?arnumber=7780459"
            }]
        });
        let hit = article_to_match(&resp).unwrap();
        assert_eq!(hit.source_id, "7780459");
        assert!(hit.pdf_url.unwrap().contains("7780459"));
    }

    #[test]
    fn test_numeric_article_number_and_legacy_total() {
        let resp = json!({
            "totalRecords": 1,
            "articles": [{ "article_number": 42, "title": "T" }]
        });
        let hit = article_to_match(&resp).unwrap();
        assert_eq!(hit.source_id, "42");
        assert_eq!(hit.pdf_url, None);
    }

    #[test]
    fn test_zero_records() {
        assert_eq!(article_to_match(&json!({ "total_records": 0, "articles": [] })), None);
        assert_eq!(article_to_match(&json!({})), None);
    }
}
