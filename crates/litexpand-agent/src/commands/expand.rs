//! `litexpand expand`: write a literature review from the local corpus and
//! download every paper it names.

use anyhow::Context;
use litexpand_ingestion::extract_references;
use litexpand_llm::{REVIEW_QUESTION, REVIEW_SYSTEM_PROMPT};
use tracing::info;

use super::{build_copilot, build_pipeline, echo, print_summary};
use crate::config::Config;

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let copilot = build_copilot(config, REVIEW_SYSTEM_PROMPT)?;
    info!("Copilot initialised");

    let (retrieved, answer) = copilot.ask(REVIEW_QUESTION, &[]).await?;
    info!(context_chars = retrieved.len(), "Generating literature review");
    let review = answer.collect_with(echo).await?;
    println!();

    let review_path = &config.output.review_path;
    std::fs::write(review_path, &review)
        .with_context(|| format!("Cannot write review to {}", review_path.display()))?;
    info!(path = %review_path.display(), "Literature review saved");

    let titles = extract_references(&review);
    info!(titles = titles.len(), "Extracted referenced titles");
    if titles.is_empty() {
        println!("The review names no papers to acquire.");
        return Ok(());
    }

    let report = build_pipeline(config)?.run(&titles).await;
    print_summary(&report);
    Ok(())
}
