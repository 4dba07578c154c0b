use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;
use url::Url;
use crate::error::LitexpandError;

/// Default per-request timeout for every external call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("litexpand/", env!("CARGO_PKG_VERSION"), " (literature review)");

/// An HTTP client that only sends API requests to approved domains and never
/// waits longer than its configured timeout.
///
/// Search endpoints go through [`SandboxClient::get`] and must match the
/// allowlist. Document downloads go through [`SandboxClient::fetch_document`]:
/// their location comes from an API response and may live on any publisher
/// host, so only the scheme is checked.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
    timeout: Duration,
}

impl SandboxClient {
    /// Creates a client with the default allowlist and [`DEFAULT_TIMEOUT`].
    pub fn new() -> Result<Self, LitexpandError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, LitexpandError> {
        let mut allowlist = HashSet::new();
        let domains = [
            "export.arxiv.org",             // arXiv search
            "arxiv.org",                    // arXiv PDFs
            "api.semanticscholar.org",      // Semantic Scholar
            "ieeexploreapi.ieee.org",       // IEEE Xplore
            "api.acm.org",                  // ACM Digital Library
            "eutils.ncbi.nlm.nih.gov",      // PubMed
            "doi.org",                      // DOI resolver
            "api.openai.com",               // OpenAI LLMs
            "localhost",                    // Ollama / local servers
            "127.0.0.1",
        ];
        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, allowlist, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    /// Subdomains of an allowed host are accepted.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    /// GET request to an allowlisted API endpoint.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, LitexpandError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    /// GET request for a document location returned by a search API.
    /// Any http(s) host is accepted; other schemes are refused.
    pub fn fetch_document(&self, url: &str) -> Result<reqwest::RequestBuilder, LitexpandError> {
        let parsed = Url::parse(url).map_err(|e| LitexpandError::InvalidUrl(format!("{url}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(self.client.get(parsed)),
            other => Err(LitexpandError::Security(format!(
                "refusing to fetch document over scheme '{other}': {url}"
            ))),
        }
    }

    fn check(&self, url: &str) -> Result<(), LitexpandError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            warn!(%url, "Blocked request outside sandbox allowlist");
            Err(LitexpandError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {url}"
            )))
        }
    }
}
