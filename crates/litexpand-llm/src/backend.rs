//! LLM backend trait and the OpenAI-compatible implementation.
//!
//! `OpenAiCompatibleBackend` speaks `/v1/chat/completions` and works against
//! api.openai.com as well as local servers (LM Studio, vLLM, Ollama's
//! OpenAI shim). Streaming responses arrive as server-sent events and are
//! exposed as a [`TokenStream`] of text fragments.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

impl LlmError {
    /// Transport failures, throttling and server-side errors are worth
    /// another attempt; malformed payloads and client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::Unavailable(_) | LlmError::RateLimitExceeded => true,
            LlmError::ApiError { status, .. } => *status >= 500 || *status == 408,
            LlmError::Serde(_) => false,
        }
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Incremental answer text, one fragment per item.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Streamed completion. Backends without streaming support yield the
    /// whole answer as a single fragment.
    async fn complete_stream(&self, req: LlmRequest) -> Result<TokenStream, LlmError> {
        let resp = self.complete(req).await?;
        Ok(Box::pin(stream::once(async move { Ok(resp.content) })))
    }

    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

async fn check_response_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = resp.status().as_u16();
    if status == 429 {
        return Err(LlmError::RateLimitExceeded);
    }
    if status >= 400 {
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| {
                body["error"]["message"]
                    .as_str()
                    .or_else(|| body["message"].as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| {
                if text.trim().is_empty() { "unknown API error".to_string() } else { text }
            });
        return Err(LlmError::ApiError { status, message });
    }
    Ok(resp)
}

// ── Server-sent events ────────────────────────────────────────────────────────

#[derive(Debug)]
enum SseEvent {
    Token(String),
    Done,
    Skip,
    Error(LlmError),
}

/// Interpret one line of a chat-completions event stream.
fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    if data.is_empty() {
        return SseEvent::Skip;
    }

    let json: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return SseEvent::Error(e.into()),
    };
    if let Some(msg) = json["error"]["message"].as_str() {
        return SseEvent::Error(LlmError::Unavailable(msg.to_string()));
    }
    match json["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => SseEvent::Token(text.to_string()),
        _ => SseEvent::Skip,
    }
}

struct SseState<S> {
    body: Pin<Box<S>>,
    buf: Vec<u8>,
    ended: bool,
    done: bool,
}

/// Turn a chunked SSE body into a stream of content fragments. Lines may be
/// split across chunks, so bytes are buffered until a newline arrives.
fn sse_tokens<S, B, E>(body: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state = SseState { body: Box::pin(body), buf: Vec::new(), ended: false, done: false };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }

            if let Some(pos) = st.buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = st.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw);
                match parse_sse_line(line.trim_end()) {
                    SseEvent::Token(text) => return Some((Ok(text), st)),
                    SseEvent::Skip => continue,
                    SseEvent::Done => {
                        st.done = true;
                        return None;
                    }
                    SseEvent::Error(e) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
            }

            if st.ended {
                if st.buf.is_empty() {
                    return None;
                }
                // Trailing line without a final newline.
                st.buf.push(b'\n');
                continue;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e.into()), st));
                }
                None => st.ended = true,
            }
        }
    }))
}

// ── OpenAI-compatible ─────────────────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body(&self, req: &LlmRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model":    req.model.as_deref().unwrap_or(&self.model),
            "messages": req.messages,
            "stream":   stream,
        });
        if let Some(max_tokens) = req.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        if let Some(temperature) = req.temperature {
            body["temperature"] = temperature.into();
        }
        body
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    #[instrument(skip(self, req), fields(model = %self.model, messages = req.messages.len()))]
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.request_body(&req, false);
        let resp = self.auth(self.client.post(self.endpoint())).json(&body).send().await?;
        let json: serde_json::Value = check_response_status(resp).await?.json().await?;
        let parsed = parse_openai_response(&json, &self.model);
        debug!(
            prompt_tokens = parsed.prompt_tokens,
            completion_tokens = parsed.completion_tokens,
            "Completion received"
        );
        Ok(parsed)
    }

    #[instrument(skip(self, req), fields(model = %self.model, messages = req.messages.len()))]
    async fn complete_stream(&self, req: LlmRequest) -> Result<TokenStream, LlmError> {
        let body = self.request_body(&req, true);
        let resp = self.auth(self.client.post(self.endpoint())).json(&body).send().await?;
        let resp = check_response_status(resp).await?;
        debug!("Streaming completion started");
        Ok(sse_tokens(resp.bytes_stream()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_local(&self) -> bool {
        self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
