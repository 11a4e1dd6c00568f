use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::search::SourceError;

/// Lookup tables a retailer publishes once and rarely changes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub currencies: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ReferenceData {
    pub fn supports_country(&self, country: &str) -> bool {
        self.countries.iter().any(|known| known.eq_ignore_ascii_case(country.trim()))
    }

    pub fn supports_currency(&self, currency: &str) -> bool {
        self.currencies.iter().any(|known| known.eq_ignore_ascii_case(currency.trim()))
    }
}

#[async_trait]
pub trait ReferenceLoader: Send + Sync {
    async fn load(&self) -> Result<ReferenceData, SourceError>;
}

/// Loads reference data on first use and keeps it until [`ReferenceDataCache::invalidate`].
///
/// Concurrent callers share a single load. A failed load is not cached.
pub struct ReferenceDataCache {
    loader: Arc<dyn ReferenceLoader>,
    cached: Mutex<Option<Arc<ReferenceData>>>,
}

impl ReferenceDataCache {
    pub fn new(loader: Arc<dyn ReferenceLoader>) -> Self {
        Self { loader, cached: Mutex::new(None) }
    }

    pub async fn get(&self) -> Result<Arc<ReferenceData>, SourceError> {
        let mut cached = self.cached.lock().await;
        if let Some(data) = cached.as_ref() {
            return Ok(Arc::clone(data));
        }

        let data = Arc::new(self.loader.load().await?);
        tracing::info!(
            event_name = "reference.loaded",
            countries = data.countries.len(),
            categories = data.categories.len(),
            "loaded reference data"
        );
        *cached = Some(Arc::clone(&data));
        Ok(data)
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
        tracing::debug!(event_name = "reference.invalidated", "cleared reference data cache");
    }

    pub async fn is_loaded(&self) -> bool {
        self.cached.lock().await.is_some()
    }
}
