use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::candidate::{Candidate, CandidatePayload};
use crate::reference::{ReferenceData, ReferenceDataCache, ReferenceLoader};
use crate::search::{ProductSource, SearchConstraints, SourceError};

/// Retailer exposing `GET {base_url}/products` as a JSON array of products.
pub struct HttpJsonSource {
    id: String,
    base_url: String,
    client: Client,
    reference: Option<Arc<ReferenceDataCache>>,
}

impl HttpJsonSource {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            reference: None,
        }
    }

    /// Only forwards `country` when the cache lists it as supported.
    pub fn with_reference(mut self, reference: Arc<ReferenceDataCache>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn country_supported(&self, country: &str) -> bool {
        let Some(reference) = &self.reference else {
            return false;
        };
        match reference.get().await {
            Ok(data) => data.supports_country(country),
            Err(error) => {
                tracing::warn!(
                    event_name = "search.reference_unavailable",
                    source_id = %self.id,
                    error = %error,
                    "dropping country filter without reference data"
                );
                false
            }
        }
    }

    fn unavailable(&self, message: impl Into<String>) -> SourceError {
        SourceError::Unavailable { source_id: self.id.clone(), message: message.into() }
    }
}

#[async_trait]
impl ProductSource for HttpJsonSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> Result<Vec<Candidate>, SourceError> {
        let send_country = match constraints.country.as_deref() {
            Some(country) => self.country_supported(country).await,
            None => false,
        };
        let params = query_params(query, constraints, send_country);

        let response = self
            .client
            .get(format!("{}/products", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|error| self.unavailable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!("products endpoint returned {}", response.status())));
        }

        let body = response.bytes().await.map_err(|error| self.unavailable(error.to_string()))?;
        decode_products(&self.id, &body)
    }
}

pub(crate) fn query_params(
    query: &str,
    constraints: &SearchConstraints,
    send_country: bool,
) -> Vec<(&'static str, String)> {
    let mut params = vec![("q", query.to_string()), ("limit", constraints.limit.to_string())];
    if let Some(category) = &constraints.category {
        params.push(("category", category.as_str().to_string()));
    }
    params.push(("currency", constraints.currency.clone()));
    if send_country {
        if let Some(country) = &constraints.country {
            params.push(("country", country.clone()));
        }
    }
    if let Some(price_min) = constraints.price_min {
        params.push(("price_min", price_min.to_string()));
    }
    if let Some(price_max) = constraints.price_max {
        params.push(("price_max", price_max.to_string()));
    }
    params
}

pub(crate) fn decode_products(source_id: &str, body: &[u8]) -> Result<Vec<Candidate>, SourceError> {
    let malformed =
        |message: String| SourceError::Malformed { source_id: source_id.to_string(), message };

    let payloads: Vec<CandidatePayload> =
        serde_json::from_slice(body).map_err(|error| malformed(error.to_string()))?;

    payloads
        .into_iter()
        .map(|payload| payload.into_candidate(source_id).map_err(|error| malformed(error.to_string())))
        .collect()
}

/// Loads `GET {base_url}/reference` for a [`ReferenceDataCache`].
pub struct HttpReferenceLoader {
    source_id: String,
    base_url: String,
    client: Client,
}

impl HttpReferenceLoader {
    pub fn new(source_id: impl Into<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            source_id: source_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl ReferenceLoader for HttpReferenceLoader {
    async fn load(&self) -> Result<ReferenceData, SourceError> {
        let unavailable = |message: String| SourceError::Unavailable {
            source_id: self.source_id.clone(),
            message,
        };

        let response = self
            .client
            .get(format!("{}/reference", self.base_url))
            .send()
            .await
            .map_err(|error| unavailable(error.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("reference endpoint returned {}", response.status())));
        }

        response.json::<ReferenceData>().await.map_err(|error| SourceError::Malformed {
            source_id: self.source_id.clone(),
            message: error.to_string(),
        })
    }
}

pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}
