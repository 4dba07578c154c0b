//! ACM Digital Library client.
//!
//! Endpoint: https://api.acm.org/publication/v1/articles
//! Requires a bearer token, which is also sent with the PDF request.

use async_trait::async_trait;
use litexpand_common::SandboxClient as Client;
use tracing::{debug, instrument};

use crate::models::{PaperMatch, SourceKind};
use super::{non_empty, read_document, read_json, AcquisitionError, PaperSource};

const ACM_SEARCH_URL: &str = "https://api.acm.org/publication/v1/articles";

pub struct AcmClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl AcmClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: non_empty(api_key),
            base_url: ACM_SEARCH_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

#[async_trait]
impl PaperSource for AcmClient {
    fn kind(&self) -> SourceKind {
        SourceKind::AcmDigitalLibrary
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self))]
    async fn search(&self, title: &str) -> Result<Option<PaperMatch>, AcquisitionError> {
        let req = self.client
            .get(&self.base_url)?
            .query(&[("query", title.trim()), ("count", "1"), ("sort", "relevance")]);

        let json = read_json(self.authorize(req).send().await?).await?;
        Ok(result_to_match(&json))
    }

    async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let req = self.client.fetch_document(url)?;
        read_document(self.authorize(req).send().await?).await
    }
}

fn result_to_match(resp: &serde_json::Value) -> Option<PaperMatch> {
    let total = resp["totalResults"].as_u64().unwrap_or(0);
    debug!(total, "ACM search results");
    if total == 0 {
        return None;
    }

    let article = resp["results"].as_array()?.first()?;
    let id = &article["articleId"];
    let source_id = id
        .as_str()
        .map(String::from)
        .or_else(|| id.as_u64().map(|n| n.to_string()))?;

    Some(PaperMatch {
        source_id,
        title: article["title"].as_str().unwrap_or("").to_string(),
        pdf_url: article["pdfUrl"].as_str().map(String::from),
    })
}
