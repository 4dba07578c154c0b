use thiserror::Error;

#[derive(Debug, Error)]
pub enum LitexpandError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Sandbox policy violation: {0}")]
    Security(String),
}

pub type Result<T> = std::result::Result<T, LitexpandError>;
