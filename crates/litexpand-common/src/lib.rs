//! litexpand-common: Shared error type, the sandboxed HTTP client used by
//! every crate that talks to the network, and the retrieval interface.

pub mod error;
pub mod retrieval;
pub mod sandbox;

pub use error::{LitexpandError, Result};
pub use retrieval::{Passage, Retriever};
pub use sandbox::SandboxClient;
