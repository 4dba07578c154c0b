//! Bibliographic source clients and the acquisition strategy built on them.
//!
//! Each source only knows how to search for a title and fetch a PDF
//! ([`PaperSource`]). [`StoredSource`] wraps any source with the common
//! attempt flow: credential gate, single-best-match search, id-derived file
//! name, existence check, download, store. Errors never leave
//! [`SourceStrategy::attempt`]; they come back as [`AttemptOutcome::Failed`].

pub mod acm;
pub mod arxiv;
pub mod ieee;
pub mod pubmed;
pub mod semantic_scholar;

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use litexpand_common::{LitexpandError, SandboxClient};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{PaperMatch, SourceKind};
use crate::store::PdfStore;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure inside a single strategy attempt. Never crosses the strategy
/// boundary.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("document at {url} is not a PDF")]
    NotAPdf { url: String },

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sandbox(#[from] LitexpandError),
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// Result of one strategy attempt for one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// PDF fetched and written.
    Downloaded { path: PathBuf, resolved_title: String },
    /// The derived file already existed; nothing was downloaded.
    AlreadyStored { path: PathBuf, resolved_title: String },
    /// Required credential missing; no network call was made.
    NotConfigured,
    /// The source found nothing for the title.
    NoMatch,
    /// A match was found but it exposes no document location.
    NoDocument,
    /// Transport, parse, or storage failure.
    Failed(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Downloaded { .. } | AttemptOutcome::AlreadyStored { .. })
    }

    pub fn stored_path(&self) -> Option<&Path> {
        match self {
            AttemptOutcome::Downloaded { path, .. } | AttemptOutcome::AlreadyStored { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Downloaded { .. }    => "downloaded",
            AttemptOutcome::AlreadyStored { .. } => "already_stored",
            AttemptOutcome::NotConfigured        => "not_configured",
            AttemptOutcome::NoMatch              => "no_match",
            AttemptOutcome::NoDocument           => "no_document",
            AttemptOutcome::Failed(_)            => "failed",
        }
    }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// One entry in the ordered fallback chain.
#[async_trait]
pub trait SourceStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Try to resolve `title` to a stored PDF. Never panics on remote
    /// failures and never returns an error.
    async fn attempt(&self, title: &str) -> AttemptOutcome;
}

/// Search and download capability of one bibliographic source.
#[async_trait]
pub trait PaperSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// `false` when a required credential is absent.
    fn is_configured(&self) -> bool {
        true
    }

    /// Free-text title query, single most relevant match.
    async fn search(&self, title: &str) -> Result<Option<PaperMatch>, AcquisitionError>;

    /// Fetch raw document bytes from a location returned by [`search`](Self::search).
    async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>, AcquisitionError>;
}

// ── Common attempt flow ──────────────────────────────────────────────────────

/// A [`PaperSource`] bound to a [`PdfStore`].
pub struct StoredSource<S> {
    source: S,
    store: PdfStore,
}

impl<S: PaperSource> StoredSource<S> {
    pub fn new(source: S, store: PdfStore) -> Self {
        Self { source, store }
    }

    async fn try_attempt(&self, title: &str) -> Result<AttemptOutcome, AcquisitionError> {
        let kind = self.source.kind();

        let Some(hit) = self.source.search(title).await? else {
            info!(source = kind.as_str(), %title, "No match found");
            return Ok(AttemptOutcome::NoMatch);
        };

        let Some(pdf_url) = hit.pdf_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            info!(source = kind.as_str(), %title, id = %hit.source_id, "No PDF found");
            return Ok(AttemptOutcome::NoDocument);
        };

        if self.store.contains(&hit.source_id) {
            let path = self.store.path_for(&hit.source_id);
            debug!(source = kind.as_str(), path = %path.display(), "Already stored, skipping download");
            return Ok(AttemptOutcome::AlreadyStored { path, resolved_title: hit.title });
        }

        let bytes = self.source.fetch_pdf(pdf_url).await?;
        if !looks_like_pdf(&bytes) {
            return Err(AcquisitionError::NotAPdf { url: pdf_url.to_string() });
        }

        let path = self.store.save(&hit.source_id, &bytes)?;
        info!("Downloaded ({}): {}", kind.display_name(), hit.title);
        Ok(AttemptOutcome::Downloaded { path, resolved_title: hit.title })
    }
}

#[async_trait]
impl<S: PaperSource> SourceStrategy for StoredSource<S> {
    fn name(&self) -> &str {
        self.source.kind().display_name()
    }

    async fn attempt(&self, title: &str) -> AttemptOutcome {
        let kind = self.source.kind();
        if !self.source.is_configured() {
            debug!(source = kind.as_str(), "Source not configured, skipping");
            return AttemptOutcome::NotConfigured;
        }

        match self.try_attempt(title).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(source = kind.as_str(), %title, error = %e, "Error downloading from {}", kind.display_name());
                AttemptOutcome::Failed(e.to_string())
            }
        }
    }
}

/// PDF readers tolerate junk before the header within the first 1 KiB.
fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(4).any(|w| w == b"%PDF")
}

/// Shared download step: check the status, return the body.
pub(crate) async fn read_document(resp: reqwest::Response) -> Result<Vec<u8>, AcquisitionError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(AcquisitionError::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Shared search step: check the status, parse the JSON body.
pub(crate) async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, AcquisitionError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(AcquisitionError::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        });
    }
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| AcquisitionError::Parse(e.to_string()))
}

// ── Credentials & default chain ──────────────────────────────────────────────

/// Optional per-source credentials, resolved once from config/environment and
/// handed to each source's constructor.
#[derive(Clone, Default)]
pub struct SourceCredentials {
    pub semantic_scholar_api_key: Option<String>,
    pub ieee_api_key: Option<String>,
    pub acm_api_key: Option<String>,
    /// Contact address NCBI requires for E-utilities.
    pub pubmed_email: Option<String>,
    /// Optional NCBI key for higher PubMed rate limits.
    pub ncbi_api_key: Option<String>,
}

impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(v: &Option<String>) -> Option<&'static str> {
            v.as_ref().map(|_| "***")
        }
        f.debug_struct("SourceCredentials")
            .field("semantic_scholar_api_key", &redact(&self.semantic_scholar_api_key))
            .field("ieee_api_key", &redact(&self.ieee_api_key))
            .field("acm_api_key", &redact(&self.acm_api_key))
            .field("pubmed_email", &self.pubmed_email)
            .field("ncbi_api_key", &redact(&self.ncbi_api_key))
            .finish()
    }
}

/// Treat blank strings as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// The default fallback chain: arXiv first (no credential needed), then the
/// credentialed sources. Unconfigured sources stay in the chain and skip
/// themselves without network traffic.
pub fn default_strategies(
    credentials: &SourceCredentials,
    store: &PdfStore,
    client: &SandboxClient,
) -> Vec<Box<dyn SourceStrategy>> {
    vec![
        Box::new(StoredSource::new(
            arxiv::ArxivClient::new(client.clone()),
            store.clone(),
        )),
        Box::new(StoredSource::new(
            semantic_scholar::SemanticScholarClient::new(
                client.clone(),
                credentials.semantic_scholar_api_key.clone(),
            ),
            store.clone(),
        )),
        Box::new(StoredSource::new(
            ieee::IeeeXploreClient::new(client.clone(), credentials.ieee_api_key.clone()),
            store.clone(),
        )),
        Box::new(StoredSource::new(
            acm::AcmClient::new(client.clone(), credentials.acm_api_key.clone()),
            store.clone(),
        )),
        Box::new(StoredSource::new(
            pubmed::PubMedClient::new(
                client.clone(),
                credentials.pubmed_email.clone(),
                credentials.ncbi_api_key.clone(),
            ),
            store.clone(),
        )),
    ]
}
