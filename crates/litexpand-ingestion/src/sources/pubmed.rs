//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi
//!
//! PubMed hosts no PDFs itself: the best hit's DOI is read from its MEDLINE
//! record and the document is requested through https://doi.org/. Requires a
//! contact e-mail (NCBI policy); an API key is optional.

use std::sync::OnceLock;
use async_trait::async_trait;
use litexpand_common::SandboxClient as Client;
use regex::Regex;
use tracing::{debug, instrument};

use crate::models::{PaperMatch, SourceKind};
use super::{non_empty, read_document, read_json, AcquisitionError, PaperSource};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const DOI_RESOLVER: &str = "https://doi.org";
const TOOL_NAME: &str = "litexpand";

pub struct PubMedClient {
    client: Client,
    email: Option<String>,
    api_key: Option<String>,
    base_url: String,
}

impl PubMedClient {
    pub fn new(client: Client, email: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            email: non_empty(email),
            api_key: non_empty(api_key),
            base_url: EUTILS_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", TOOL_NAME.to_string())];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Most relevant PMID for a free-text query.
    #[instrument(skip(self))]
    async fn esearch(&self, query: &str) -> Result<Option<String>, AcquisitionError> {
        let mut params = self.base_params();
        params.push(("db", "pubmed".to_string()));
        params.push(("term", query.trim().to_string()));
        params.push(("retmax", "1".to_string()));
        params.push(("retmode", "json".to_string()));

        let url = format!("{}/esearch.fcgi", self.base_url);
        let resp = read_json(self.client.get(&url)?.query(&params).send().await?).await?;

        let pmid = resp["esearchresult"]["idlist"]
            .as_array()
            .and_then(|ids| ids.first())
            .and_then(|v| v.as_str())
            .map(String::from);

        debug!(?pmid, "PubMed esearch returned PMID");
        Ok(pmid)
    }

    /// MEDLINE-format record for one PMID.
    #[instrument(skip(self))]
    async fn efetch_medline(&self, pmid: &str) -> Result<String, AcquisitionError> {
        let mut params = self.base_params();
        params.push(("db", "pubmed".to_string()));
        params.push(("id", pmid.to_string()));
        params.push(("rettype", "medline".to_string()));
        params.push(("retmode", "text".to_string()));

        let url = format!("{}/efetch.fcgi", self.base_url);
        let resp = self.client.get(&url)?.query(&params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl PaperSource for PubMedClient {
    fn kind(&self) -> SourceKind {
        SourceKind::PubMed
    }

    fn is_configured(&self) -> bool {
        self.email.is_some()
    }

    async fn search(&self, title: &str) -> Result<Option<PaperMatch>, AcquisitionError> {
        let Some(pmid) = self.esearch(title).await? else {
            return Ok(None);
        };
        let record = self.efetch_medline(&pmid).await?;
        Ok(Some(medline_to_match(&pmid, &record)))
    }

    async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let resp = self.client.fetch_document(url)?.send().await?;
        read_document(resp).await
    }
}

/// Build a match from a MEDLINE record. Without a DOI there is no document
/// location and the PMID stands in as the identifier.
fn medline_to_match(pmid: &str, record: &str) -> PaperMatch {
    let title = medline_title(record).unwrap_or_default();
    match medline_doi(record) {
        Some(doi) => PaperMatch {
            pdf_url: Some(format!("{DOI_RESOLVER}/{doi}")),
            source_id: doi,
            title,
        },
        None => PaperMatch {
            source_id: pmid.to_string(),
            title,
            pdf_url: None,
        },
    }
}

fn doi_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(?:LID|AID)\s*-\s*(\S+)\s*\[doi\]").unwrap())
}

/// DOI from the `LID`/`AID ... [doi]` lines of a MEDLINE record.
fn medline_doi(record: &str) -> Option<String> {
    doi_line().captures(record).map(|c| c[1].to_string())
}

/// `TI  - ` field, joining its indented continuation lines.
fn medline_title(record: &str) -> Option<String> {
    let mut lines = record.lines().skip_while(|l| !l.starts_with("TI  - "));
    let first = lines.next()?.trim_start_matches("TI  - ").trim().to_string();
    let rest = lines
        .take_while(|l| l.starts_with("      "))
        .map(str::trim);
    Some(std::iter::once(first.as_str()).chain(rest).collect::<Vec<_>>().join(" "))
}
