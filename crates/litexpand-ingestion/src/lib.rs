//! litexpand-ingestion: Reference extraction and paper acquisition.
//!
//! - Candidate title extraction from generated review text
//! - Per-source search-and-download strategies (arXiv, Semantic Scholar,
//!   IEEE Xplore, ACM Digital Library, PubMed)
//! - Idempotent PDF storage keyed by source identifiers
//! - The ordered fallback pipeline that drives strategies per title
//! - A lexical passage index over the local paper corpus

pub mod chunker;
pub mod corpus;
pub mod models;
pub mod pdf_parser;
pub mod pipeline;
pub mod references;
pub mod sources;
pub mod store;

pub use models::{AcquisitionResult, PaperMatch, SourceKind, TitleSet};
pub use pipeline::{AcquisitionPipeline, AcquisitionReport};
pub use references::extract_references;
pub use sources::{AttemptOutcome, SourceCredentials, SourceStrategy};
pub use store::PdfStore;
