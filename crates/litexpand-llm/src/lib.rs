//! litexpand-llm: chat-completion backends and the retrieval-augmented
//! copilot that writes literature reviews over the local corpus.

pub mod backend;
pub mod copilot;
pub mod retry;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message, OpenAiCompatibleBackend, TokenStream};
pub use copilot::{Answer, Copilot, CHAT_SYSTEM_PROMPT, REVIEW_QUESTION, REVIEW_SYSTEM_PROMPT};
pub use retry::{with_backoff, RetryPolicy};
