//! Retrieval-augmented question answering over the paper corpus.
//!
//! `Copilot::ask` pulls the top-k passages for a question, splices them into
//! the query template as a numbered list, and sends
//! `system + history + user` to the backend.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use litexpand_common::{Passage, Retriever};
use tracing::{debug, instrument};

use crate::backend::{LlmBackend, LlmError, LlmRequest, Message, TokenStream};
use crate::retry::{with_backoff, RetryPolicy};

pub const CHAT_SYSTEM_PROMPT: &str = "\
You are an expert at analyzing academic papers and creating literature reviews. Your task is to:
1. Focus on the related work sections and references
2. Identify key papers and their relationships
3. Create a comprehensive overview of how these papers relate to each other
4. Organize the citations into meaningful categories
5. Highlight seminal works and their influence

Please structure your response with:
- Key research themes
- Important papers in each theme
- How papers build upon or relate to each other";

/// Same task as [`CHAT_SYSTEM_PROMPT`], plus the bracket convention that lets
/// referenced titles be pulled back out of the answer.
pub const REVIEW_SYSTEM_PROMPT: &str = "\
You are an expert at analyzing academic papers and creating literature reviews. Your task is to:
1. Focus on the related work sections and references
2. Identify key papers and their relationships
3. Create a comprehensive overview of how these papers relate to each other
4. Organize the citations into meaningful categories
5. Highlight seminal works and their influence

IMPORTANT: When mentioning paper titles, always enclose them in square brackets, like [Paper Title Here].

Please structure your response with:
- Key research themes
- Important papers in each theme
- How papers build upon or relate to each other";

pub const REVIEW_QUESTION: &str = "Please analyze these papers and create a structured literature review. \
Focus on how papers relate to each other and their key contributions.";

const DEFAULT_TOP_K: usize = 3;

fn build_query(question: &str, retrieved_info: &str) -> String {
    format!(
        "The user is asking a question: {question}\n\n\
         The retrieved information is: {retrieved_info}\n\n\
         Please answer the question based on the retrieved information.\n\n\
         Please highlight the information with bold text and bullet points."
    )
}

/// `1. <text>` per passage, one per line.
pub fn format_retrieved(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p.text))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Answer ────────────────────────────────────────────────────────────────────

pub enum Answer {
    Text(String),
    Stream(TokenStream),
}

impl Answer {
    /// Concatenate the full answer, handing every fragment to `sink` as it
    /// arrives.
    pub async fn collect_with<F: FnMut(&str)>(self, mut sink: F) -> Result<String, LlmError> {
        match self {
            Answer::Text(text) => {
                sink(&text);
                Ok(text)
            }
            Answer::Stream(mut fragments) => {
                let mut out = String::new();
                while let Some(fragment) = fragments.next().await {
                    let fragment = fragment?;
                    sink(&fragment);
                    out.push_str(&fragment);
                }
                Ok(out)
            }
        }
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Answer::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ── Copilot ───────────────────────────────────────────────────────────────────

pub struct Copilot {
    retriever: Arc<dyn Retriever>,
    backend: Arc<dyn LlmBackend>,
    system_prompt: String,
    top_k: usize,
    retry: RetryPolicy,
    stream: bool,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl Copilot {
    pub fn new(retriever: Arc<dyn Retriever>, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            retriever,
            backend,
            system_prompt: CHAT_SYSTEM_PROMPT.to_string(),
            top_k: DEFAULT_TOP_K,
            retry: RetryPolicy::default(),
            stream: true,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn build_messages(&self, question: &str, retrieved_info: &str, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages.push(Message::user(build_query(question, retrieved_info)));
        messages
    }

    /// Answer `question` against the corpus. Returns the retrieved context
    /// alongside the answer so callers can show or log what grounded it.
    #[instrument(skip(self, history), fields(model = self.backend.model_id(), history = history.len()))]
    pub async fn ask(&self, question: &str, history: &[Message]) -> Result<(String, Answer), LlmError> {
        let passages = self.retriever.retrieve(question, self.top_k);
        debug!(passages = passages.len(), "Retrieved context");
        let retrieved_info = format_retrieved(&passages);

        let req = LlmRequest {
            messages: self.build_messages(question, &retrieved_info, history),
            model: None,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let backend = &self.backend;
        let answer = if self.stream {
            let stream = with_backoff(&self.retry, || backend.complete_stream(req.clone())).await?;
            Answer::Stream(stream)
        } else {
            let resp = with_backoff(&self.retry, || backend.complete(req.clone())).await?;
            Answer::Text(resp.content)
        };

        Ok((retrieved_info, answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use async_trait::async_trait;
    use futures_util::stream;
    use pretty_assertions::assert_eq;

    use crate::backend::LlmResponse;

    struct FixedRetriever(Vec<&'static str>);

    impl Retriever for FixedRetriever {
        fn retrieve(&self, _query: &str, top_k: usize) -> Vec<Passage> {
            self.0
                .iter()
                .take(top_k)
                .enumerate()
                .map(|(i, text)| Passage {
                    source: PathBuf::from("corpus.txt"),
                    index: i,
                    text: text.to_string(),
                    score: 1.0,
                })
                .collect()
        }
    }

    /// Records requests; fails the first `failures` calls with a retryable error.
    struct FakeBackend {
        fragments: Vec<&'static str>,
        failures: usize,
        calls: AtomicUsize,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl FakeBackend {
        fn new(fragments: &[&'static str]) -> Self {
            Self {
                fragments: fragments.to_vec(),
                failures: 0,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, req: LlmRequest) -> Result<(), LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(req);
            if n < self.failures {
                return Err(LlmError::Unavailable("warming up".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
            self.record(req)?;
            Ok(LlmResponse {
                content: self.fragments.concat(),
                model: "fake".into(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }

        async fn complete_stream(&self, req: LlmRequest) -> Result<TokenStream, LlmError> {
            self.record(req)?;
            let items: Vec<Result<String, LlmError>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Ok(Box::pin(stream::iter(items)))
        }

        fn model_id(&self) -> &str {
            "fake"
        }

        fn is_local(&self) -> bool {
            true
        }
    }

    fn copilot(backend: Arc<FakeBackend>) -> Copilot {
        let retriever = Arc::new(FixedRetriever(vec!["alpha passage", "beta passage", "gamma passage", "delta"]));
        Copilot::new(retriever, backend).with_retry(RetryPolicy {
            max_attempts: 3,
            multiplier: std::time::Duration::from_millis(1),
            max_wait: std::time::Duration::from_millis(2),
        })
    }

    #[test]
    fn test_format_retrieved_numbers_passages() {
        let retriever = FixedRetriever(vec!["first", "second"]);
        assert_eq!(format_retrieved(&retriever.retrieve("q", 5)), "1. first\n2. second");
        assert_eq!(format_retrieved(&[]), "");
    }

    #[test]
    fn test_build_messages_order() {
        let c = copilot(Arc::new(FakeBackend::new(&[]))).with_system_prompt("SYS");
        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let msgs = c.build_messages("What is new?", "1. ctx", &history);

        let roles: Vec<&str> = msgs.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(msgs[0].content, "SYS");
        assert!(msgs[3].content.contains("What is new?"));
        assert!(msgs[3].content.contains("1. ctx"));
    }

    #[tokio::test]
    async fn test_ask_streams_and_echoes_fragments() {
        let backend = Arc::new(FakeBackend::new(&["See ", "[BERT]", "."]));
        let c = copilot(backend.clone());

        let (retrieved, answer) = c.ask("Summarise", &[]).await.unwrap();
        let mut echoed = Vec::new();
        let text = answer.collect_with(|f| echoed.push(f.to_string())).await.unwrap();

        assert_eq!(retrieved, "1. alpha passage\n2. beta passage\n3. gamma passage");
        assert_eq!(text, "See [BERT].");
        assert_eq!(echoed, vec!["See ", "[BERT]", "."]);

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].content, CHAT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_ask_without_streaming_returns_text() {
        let backend = Arc::new(FakeBackend::new(&["whole ", "answer"]));
        let c = copilot(backend).with_streaming(false).with_top_k(1);

        let (retrieved, answer) = c.ask("q", &[]).await.unwrap();

        assert_eq!(retrieved, "1. alpha passage");
        assert!(matches!(&answer, Answer::Text(t) if t == "whole answer"));
    }

    #[tokio::test]
    async fn test_ask_retries_transient_failures() {
        let mut fake = FakeBackend::new(&["ok"]);
        fake.failures = 2;
        let backend = Arc::new(fake);
        let c = copilot(backend.clone());

        let (_, answer) = c.ask("q", &[]).await.unwrap();

        assert_eq!(answer.collect_with(|_| {}).await.unwrap(), "ok");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_ask_surfaces_error_after_retries() {
        let mut fake = FakeBackend::new(&["never"]);
        fake.failures = 10;
        let backend = Arc::new(fake);
        let c = copilot(backend.clone());

        assert!(matches!(c.ask("q", &[]).await, Err(LlmError::Unavailable(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_review_prompt_asks_for_bracketed_titles() {
        assert!(REVIEW_SYSTEM_PROMPT.contains("[Paper Title Here]"));
        assert!(!CHAT_SYSTEM_PROMPT.contains("square brackets"));
    }
}
