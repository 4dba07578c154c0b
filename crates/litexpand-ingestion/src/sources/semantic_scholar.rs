//! Semantic Scholar Graph API client.
//!
//! Endpoint: https://api.semanticscholar.org/graph/v1/paper/search
//! Requires an API key (`x-api-key` header); without one the source is skipped.

use async_trait::async_trait;
use litexpand_common::SandboxClient as Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::models::{PaperMatch, SourceKind};
use super::{non_empty, read_document, read_json, AcquisitionError, PaperSource};

const S2_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "openAccessPdf")]
    open_access_pdf: Option<OpenAccessPdf>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    url: Option<String>,
}

pub struct SemanticScholarClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl SemanticScholarClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: non_empty(api_key),
            base_url: S2_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PaperSource for SemanticScholarClient {
    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self))]
    async fn search(&self, title: &str) -> Result<Option<PaperMatch>, AcquisitionError> {
        let url = format!("{}/paper/search", self.base_url);
        let mut req = self.client
            .get(&url)?
            .query(&[
                ("query", title.trim()),
                ("limit", "1"),
                ("fields", "paperId,title,openAccessPdf"),
            ]);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let json = read_json(req.send().await?).await?;
        let resp: SearchResponse = serde_json::from_value(json)
            .map_err(|e| AcquisitionError::Parse(format!("Semantic Scholar search: {e}")))?;

        debug!(n = resp.data.len(), "Semantic Scholar search results");
        Ok(resp.data.into_iter().next().and_then(to_match))
    }

    async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let resp = self.client.fetch_document(url)?.send().await?;
        read_document(resp).await
    }
}

fn to_match(paper: S2Paper) -> Option<PaperMatch> {
    let source_id = paper.paper_id.filter(|id| !id.is_empty())?;
    Some(PaperMatch {
        source_id,
        title: paper.title.unwrap_or_default(),
        pdf_url: paper
            .open_access_pdf
            .and_then(|p| p.url)
            .filter(|u| !u.is_empty()),
    })
}
