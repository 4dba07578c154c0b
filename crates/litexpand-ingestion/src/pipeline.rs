//! Ordered fallback acquisition pipeline.
//!
//! For every candidate title:
//!   1. Try each strategy in priority order
//!   2. Stop at the first strategy that stores (or already has) a PDF
//!   3. If all strategies fail, log the title once as unresolved
//!
//! Titles are processed one after another and independently: a title that
//! exhausts every source has no effect on the next one. Nothing in here
//! returns an error; every outcome ends up in the [`AcquisitionReport`].

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use litexpand_common::SandboxClient;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{AcquisitionResult, TitleSet};
use crate::sources::{default_strategies, SourceCredentials, SourceStrategy};
use crate::store::PdfStore;

// ── Report ────────────────────────────────────────────────────────────────────

/// Outcome of one pipeline run over a [`TitleSet`].
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub results: Vec<AcquisitionResult>,
    pub duration_ms: u64,
}

impl AcquisitionReport {
    /// Title → acquired.
    pub fn outcomes(&self) -> BTreeMap<String, bool> {
        self.results
            .iter()
            .map(|r| (r.title.clone(), r.acquired))
            .collect()
    }

    pub fn acquired_count(&self) -> usize {
        self.results.iter().filter(|r| r.acquired).count()
    }

    pub fn unresolved(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.acquired)
            .map(|r| r.title.as_str())
            .collect()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct AcquisitionPipeline {
    strategies: Vec<Box<dyn SourceStrategy>>,
}

impl AcquisitionPipeline {
    /// Strategies are tried in the order given.
    pub fn new(strategies: Vec<Box<dyn SourceStrategy>>) -> Self {
        Self { strategies }
    }

    /// The default chain: arXiv, then every credentialed source.
    pub fn with_default_sources(
        credentials: &SourceCredentials,
        store: &PdfStore,
        client: &SandboxClient,
    ) -> Self {
        Self::new(default_strategies(credentials, store, client))
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve one title, stopping at the first successful strategy.
    #[instrument(skip(self))]
    pub async fn acquire(&self, title: &str) -> AcquisitionResult {
        for strategy in &self.strategies {
            let outcome = strategy.attempt(title).await;
            debug!(source = strategy.name(), outcome = outcome.as_str(), "Strategy finished");

            if let Some(path) = outcome.stored_path() {
                info!(source = strategy.name(), path = %path.display(), %title, "Paper acquired");
                return AcquisitionResult::acquired(title, strategy.name(), path);
            }
        }

        warn!("Failed to download paper from all sources: {}", title);
        AcquisitionResult::unresolved(title)
    }

    /// Resolve every title in the set independently.
    pub async fn run(&self, titles: &TitleSet) -> AcquisitionReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let t0 = std::time::Instant::now();

        info!(
            run_id = %run_id,
            titles = titles.len(),
            sources = ?self.strategy_names(),
            "Starting acquisition run"
        );

        let mut results = Vec::with_capacity(titles.len());
        for title in titles.iter() {
            results.push(self.acquire(title).await);
        }

        let report = AcquisitionReport {
            run_id,
            started_at,
            results,
            duration_ms: t0.elapsed().as_millis() as u64,
        };

        info!(
            run_id      = %run_id,
            acquired    = report.acquired_count(),
            unresolved  = report.unresolved().len(),
            duration_ms = report.duration_ms,
            "Acquisition run complete"
        );

        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::sources::AttemptOutcome;

    /// Succeeds for the titles it knows, counts every call.
    struct ScriptedStrategy {
        name: &'static str,
        resolves: HashSet<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedStrategy {
        fn new(name: &'static str, resolves: &[&'static str]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let s = Self {
                name,
                resolves: resolves.iter().copied().collect(),
                calls: calls.clone(),
            };
            (s, calls)
        }
    }

    #[async_trait]
    impl SourceStrategy for ScriptedStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn attempt(&self, title: &str) -> AttemptOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.resolves.contains(title) {
                AttemptOutcome::Downloaded {
                    path: PathBuf::from(format!("/data/{}-{}.pdf", self.name, title)),
                    resolved_title: title.to_string(),
                }
            } else {
                AttemptOutcome::NoMatch
            }
        }
    }

    #[tokio::test]
    async fn test_acquire_short_circuits_on_first_success() {
        let (s1, c1) = ScriptedStrategy::new("s1", &[]);
        let (s2, c2) = ScriptedStrategy::new("s2", &["T"]);
        let (s3, c3) = ScriptedStrategy::new("s3", &[]);
        let pipeline = AcquisitionPipeline::new(vec![Box::new(s1), Box::new(s2), Box::new(s3)]);

        let result = pipeline.acquire("T").await;

        assert!(result.acquired);
        assert_eq!(result.source.as_deref(), Some("s2"));
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_acquire_exhausts_all_strategies() {
        let (s1, c1) = ScriptedStrategy::new("s1", &[]);
        let (s2, c2) = ScriptedStrategy::new("s2", &[]);
        let pipeline = AcquisitionPipeline::new(vec![Box::new(s1), Box::new(s2)]);

        let result = pipeline.acquire("Nowhere").await;

        assert_eq!(result, AcquisitionResult::unresolved("Nowhere"));
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_outcomes_are_independent() {
        let (s1, _) = ScriptedStrategy::new("s1", &["A"]);
        let pipeline = AcquisitionPipeline::new(vec![Box::new(s1)]);
        let titles: TitleSet = ["A", "B"].into_iter().collect();

        let report = pipeline.run(&titles).await;

        let expected: BTreeMap<String, bool> =
            [("A".to_string(), true), ("B".to_string(), false)].into_iter().collect();
        assert_eq!(report.outcomes(), expected);
        assert_eq!(report.acquired_count(), 1);
        assert_eq!(report.unresolved(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_empty_chain_resolves_nothing() {
        let pipeline = AcquisitionPipeline::new(vec![]);
        let titles: TitleSet = ["A"].into_iter().collect();
        let report = pipeline.run(&titles).await;
        assert_eq!(report.unresolved(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_empty_title_set() {
        let (s1, c1) = ScriptedStrategy::new("s1", &["A"]);
        let pipeline = AcquisitionPipeline::new(vec![Box::new(s1)]);
        let report = pipeline.run(&TitleSet::new()).await;
        assert!(report.results.is_empty());
        assert_eq!(c1.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_strategy_names_keep_priority_order() {
        let (a, _) = ScriptedStrategy::new("first", &[]);
        let (b, _) = ScriptedStrategy::new("second", &[]);
        let pipeline = AcquisitionPipeline::new(vec![Box::new(a), Box::new(b)]);
        assert_eq!(pipeline.strategy_names(), vec!["first", "second"]);
    }
}
