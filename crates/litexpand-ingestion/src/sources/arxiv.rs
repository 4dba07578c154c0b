//! arXiv preprint client.
//!
//! Endpoint: https://export.arxiv.org/api/query (Atom feed)
//!
//! Always enabled; arXiv needs no credential. Stored files are named by the
//! entry's short id (e.g. `1706.03762v7`).

use async_trait::async_trait;
use litexpand_common::SandboxClient as Client;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument};

use crate::models::{PaperMatch, SourceKind};
use super::{read_document, AcquisitionError, PaperSource};

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivClient {
    client: Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(client: Client) -> Self {
        Self { client, base_url: ARXIV_API_URL.to_string() }
    }

    /// Point the client at a different query endpoint (mirrors, tests).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    #[instrument(skip(self))]
    async fn search(&self, title: &str) -> Result<Option<PaperMatch>, AcquisitionError> {
        let resp = self.client
            .get(&self.base_url)?
            .query(&[
                ("search_query", title.trim()),
                ("start", "0"),
                ("max_results", "1"),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }

        let xml = resp.text().await?;
        let hit = parse_first_entry(&xml)?;
        debug!(found = hit.is_some(), "arXiv search finished");
        Ok(hit)
    }

    async fn fetch_pdf(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let resp = self.client.fetch_document(url)?.send().await?;
        read_document(resp).await
    }
}

/// Short id from an entry id URL: `http://arxiv.org/abs/1706.03762v7` → `1706.03762v7`.
pub fn short_id(entry_id: &str) -> &str {
    entry_id
        .rsplit_once("arxiv.org/abs/")
        .map(|(_, id)| id)
        .unwrap_or(entry_id)
        .trim_matches('/')
}

/// Parse the first `<entry>` of an arXiv Atom feed.
///
/// Returns `Ok(None)` for a feed without entries. The API reports bad
/// queries as an entry whose id points at `/api/errors`; that becomes a
/// parse error.
fn parse_first_entry(xml: &str) -> Result<Option<PaperMatch>, AcquisitionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_entry = false;
    let mut in_id    = false;
    let mut in_title = false;
    let mut in_summary = false;
    let mut entry_id = String::new();
    let mut title    = String::new();
    let mut summary  = String::new();
    let mut pdf_url: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"entry"   => in_entry = true,
                b"id"      if in_entry => in_id = true,
                b"title"   if in_entry => in_title = true,
                b"summary" if in_entry => in_summary = true,
                b"link"    if in_entry => {
                    if let Some(href) = pdf_link(e) {
                        pdf_url = Some(href);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if in_entry && e.local_name().as_ref() == b"link" {
                    if let Some(href) = pdf_link(e) {
                        pdf_url = Some(href);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_id      { entry_id.push_str(&text); }
                if in_title   { title.push_str(&text); }
                if in_summary { summary.push_str(&text); }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"id"      => in_id = false,
                b"title"   => in_title = false,
                b"summary" => in_summary = false,
                b"entry"   => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(AcquisitionError::Parse(format!("arXiv feed: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if !in_entry || entry_id.trim().is_empty() {
        return Ok(None);
    }
    if entry_id.contains("/api/errors") {
        return Err(AcquisitionError::Parse(format!(
            "arXiv API error: {}",
            normalize_ws(&summary)
        )));
    }

    Ok(Some(PaperMatch {
        source_id: short_id(entry_id.trim()).to_string(),
        title: normalize_ws(&title),
        pdf_url,
    }))
}

/// `href` of a `<link title="pdf">` or `<link type="application/pdf">`.
fn pdf_link(e: &BytesStart<'_>) -> Option<String> {
    let mut is_pdf = false;
    let mut href = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().map(|v| v.to_string()).unwrap_or_default();
        match attr.key.as_ref() {
            b"title" if value == "pdf" => is_pdf = true,
            b"type" if value == "application/pdf" => is_pdf = true,
            b"href" => href = Some(value),
            _ => {}
        }
    }
    if is_pdf { href } else { None }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <id>http://arxiv.org/api/abc</id>
  <title type="html">ArXiv Query: search_query=Attention</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <title>Attention Is All
      You Need</title>
    <summary>The dominant sequence transduction models...</summary>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_first_entry() {
        let hit = parse_first_entry(FEED).unwrap().unwrap();
        assert_eq!(hit.source_id, "1706.03762v7");
        assert_eq!(hit.title, "Attention Is All You Need");
        assert_eq!(hit.pdf_url.as_deref(), Some("http://arxiv.org/pdf/1706.03762v7"));
    }

    #[test]
    fn test_feed_level_id_is_not_an_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <id>http://arxiv.org/api/abc</id>
  <title>ArXiv Query</title>
</feed>"#;
        assert_eq!(parse_first_entry(xml).unwrap(), None);
    }

    #[test]
    fn test_entry_without_pdf_link() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
  <id>http://arxiv.org/abs/2101.00001v1</id><title>No Links</title>
</entry></feed>"#;
        let hit = parse_first_entry(xml).unwrap().unwrap();
        assert_eq!(hit.source_id, "2101.00001v1");
        assert_eq!(hit.pdf_url, None);
    }

    #[test]
    fn test_api_error_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
  <id>http://arxiv.org/api/errors#incorrect_id_format</id>
  <title>Error</title><summary>incorrect id format</summary>
</entry></feed>"#;
        let err = parse_first_entry(xml).unwrap_err();
        assert!(err.to_string().contains("incorrect id format"));
    }

    #[test]
    fn test_short_id_old_style() {
        assert_eq!(short_id("http://arxiv.org/abs/hep-th/9901001v1"), "hep-th/9901001v1");
        assert_eq!(short_id("2301.07041"), "2301.07041");
    }
}
