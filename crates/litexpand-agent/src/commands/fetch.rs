//! `litexpand fetch`: extraction and acquisition for text supplied by the
//! user. Needs no LLM.

use std::path::PathBuf;

use anyhow::Context;
use litexpand_ingestion::extract_references;
use tokio::io::AsyncReadExt;
use tracing::info;

use super::{build_pipeline, print_summary};
use crate::config::Config;

/// Text from the file if given, else the argument, else stdin.
async fn read_input(text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {}", path.display()));
    }
    if let Some(text) = text {
        return Ok(text);
    }
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf)
}

pub async fn run(config: &Config, text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let input = read_input(text, file).await?;
    let titles = extract_references(&input);
    info!(titles = titles.len(), "Extracted referenced titles");

    if titles.is_empty() {
        println!("No candidate titles found.");
        return Ok(());
    }
    for title in titles.iter() {
        println!("  * {title}");
    }

    let report = build_pipeline(config)?.run(&titles).await;
    print_summary(&report);
    Ok(())
}
