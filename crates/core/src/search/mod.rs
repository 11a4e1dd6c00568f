//! Product sources and the fan-out that queries them.

pub mod aggregator;
pub mod http;
pub mod query;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::candidate::Candidate;
use crate::domain::requirement::Category;

pub use aggregator::{Aggregator, SearchReport, SourceOutcome, SourceStatus};
pub use http::HttpJsonSource;
pub use query::SearchQuery;

pub const DEFAULT_LIMIT_PER_SOURCE: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchConstraints {
    pub category: Option<Category>,
    pub currency: String,
    pub country: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub limit: usize,
}

impl Default for SearchConstraints {
    fn default() -> Self {
        Self {
            category: None,
            currency: "EUR".to_string(),
            country: None,
            price_min: None,
            price_max: None,
            limit: DEFAULT_LIMIT_PER_SOURCE,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source `{source_id}` unavailable: {message}")]
    Unavailable { source_id: String, message: String },
    #[error("source `{source_id}` returned malformed data: {message}")]
    Malformed { source_id: String, message: String },
    #[error("source `{source_id}` timed out after {timeout_ms}ms")]
    Timeout { source_id: String, timeout_ms: u64 },
}

/// One independent retailer. A query with no matches is `Ok(vec![])`, never an error.
#[async_trait]
pub trait ProductSource: Send + Sync {
    fn id(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> Result<Vec<Candidate>, SourceError>;
}
