//! Subcommand implementations and the wiring they share.

pub mod chat;
pub mod expand;
pub mod fetch;

use std::io::{IsTerminal, Write};
use std::sync::Arc;

use anyhow::Context;
use litexpand_common::SandboxClient;
use litexpand_ingestion::corpus::CorpusIndex;
use litexpand_ingestion::{AcquisitionPipeline, AcquisitionReport, PdfStore};
use litexpand_llm::{Copilot, OpenAiCompatibleBackend};
use tracing::info;

use crate::config::Config;

/// Acquisition pipeline over the configured data directory.
pub fn build_pipeline(config: &Config) -> anyhow::Result<AcquisitionPipeline> {
    let store = PdfStore::open(&config.acquisition.data_dir).with_context(|| {
        format!("Cannot create data directory {}", config.acquisition.data_dir.display())
    })?;
    let client = SandboxClient::with_timeout(config.http_timeout())?;
    let pipeline = AcquisitionPipeline::with_default_sources(&config.credentials(), &store, &client);
    info!(sources = ?pipeline.strategy_names(), dir = %store.dir().display(), "Acquisition pipeline ready");
    Ok(pipeline)
}

/// Copilot over a fresh index of the corpus directory.
pub fn build_copilot(config: &Config, system_prompt: &str) -> anyhow::Result<Copilot> {
    let data_dir = &config.retrieval.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Cannot create data directory {}", data_dir.display()))?;
    let index = CorpusIndex::load(data_dir, &config.chunker())
        .with_context(|| format!("Cannot index {}", data_dir.display()))?;
    if index.is_empty() {
        tracing::warn!(dir = %data_dir.display(), "Corpus is empty; answers will have no retrieved context");
    }

    let backend = OpenAiCompatibleBackend::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.api_key.clone(),
    )?;

    Ok(Copilot::new(Arc::new(index), Arc::new(backend))
        .with_system_prompt(system_prompt)
        .with_top_k(config.retrieval.top_k)
        .with_retry(config.retry_policy())
        .with_streaming(config.llm.stream)
        .with_sampling(config.llm.temperature, config.llm.max_tokens))
}

/// Make sure a hosted LLM endpoint has a key, asking on the terminal when
/// neither the config file nor the environment provided one.
pub fn ensure_api_key(config: &mut Config) -> anyhow::Result<()> {
    let local = config.llm.base_url.contains("localhost") || config.llm.base_url.contains("127.0.0.1");
    if local || config.llm.api_key.is_some() {
        return Ok(());
    }

    if std::io::stdin().is_terminal() {
        eprint!("OpenAI API key: ");
        std::io::stderr().flush()?;
        let mut key = String::new();
        std::io::stdin().read_line(&mut key)?;
        let key = key.trim();
        if !key.is_empty() {
            config.llm.api_key = Some(key.to_string());
            return Ok(());
        }
    }

    anyhow::bail!(
        "OpenAI API key not found.\n\
         Set OPENAI_API_KEY or [llm].api_key in litexpand.toml."
    )
}

/// Print one streamed fragment immediately.
pub fn echo(fragment: &str) {
    print!("{fragment}");
    let _ = std::io::stdout().flush();
}

pub fn print_summary(report: &AcquisitionReport) {
    println!(
        "\nAcquired {} of {} referenced papers.",
        report.acquired_count(),
        report.results.len()
    );
    for result in &report.results {
        match (&result.source, &result.stored_path) {
            (Some(source), Some(path)) if result.acquired => {
                println!("  + {} [{}] -> {}", result.title, source, path.display());
            }
            _ => println!("  - Failed to download paper: {}", result.title),
        }
    }
}
