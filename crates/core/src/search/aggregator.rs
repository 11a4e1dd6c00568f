use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;

use crate::domain::candidate::Candidate;
use crate::search::{ProductSource, SearchConstraints, SourceError};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_millis(8_000);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok { count: usize },
    Failed { message: String },
    TimedOut,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceOutcome {
    pub source_id: String,
    #[serde(flatten)]
    pub status: SourceStatus,
    pub elapsed_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchReport {
    pub candidates: Vec<Candidate>,
    pub outcomes: Vec<SourceOutcome>,
}

/// Queries every registered source concurrently, once, with a per-call timeout.
///
/// Source calls run inside the returned future, so dropping it cancels all of them.
#[derive(Clone)]
pub struct Aggregator {
    sources: Vec<Arc<dyn ProductSource>>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn ProductSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.id()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn search(&self, query: &str, constraints: &SearchConstraints) -> Vec<Candidate> {
        self.search_with_report(query, constraints).await.candidates
    }

    pub async fn search_with_report(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> SearchReport {
        let calls = self.sources.iter().map(|source| self.query_source(source, query, constraints));
        let results = join_all(calls).await;

        let mut report = SearchReport::default();
        for (candidates, outcome) in results {
            report.candidates.extend(candidates);
            report.outcomes.push(outcome);
        }

        tracing::info!(
            event_name = "search.aggregated",
            query = %query,
            sources = report.outcomes.len(),
            candidates = report.candidates.len(),
            "aggregated product sources"
        );
        report
    }

    async fn query_source(
        &self,
        source: &Arc<dyn ProductSource>,
        query: &str,
        constraints: &SearchConstraints,
    ) -> (Vec<Candidate>, SourceOutcome) {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, source.search(query, constraints)).await
        {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                source_id: source.id().to_string(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (candidates, status) = match result {
            Ok(candidates) => {
                let count = candidates.len();
                (candidates, SourceStatus::Ok { count })
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "search.source_failed",
                    source_id = %source.id(),
                    elapsed_ms,
                    error = %error,
                    "product source contributed no candidates"
                );
                let status = match error {
                    SourceError::Timeout { .. } => SourceStatus::TimedOut,
                    other => SourceStatus::Failed { message: other.to_string() },
                };
                (Vec::new(), status)
            }
        };

        (candidates, SourceOutcome { source_id: source.id().to_string(), status, elapsed_ms })
    }
}
