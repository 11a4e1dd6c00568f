use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.color.is_none() && self.sku.is_none() && self.extra.is_empty()
    }
}

/// A single product offer returned by one source. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Candidate {
    source_id: String,
    external_id: String,
    title: String,
    price: Decimal,
    currency: String,
    delivery_estimate_in_days: Option<u32>,
    image_url: Option<String>,
    product_url: Option<String>,
    variant: Variant,
}

impl Candidate {
    pub fn new(
        source_id: impl Into<String>,
        external_id: impl Into<String>,
        title: impl Into<String>,
        price: Decimal,
        currency: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let source_id = source_id.into();
        let external_id = external_id.into();
        let title = title.into();
        let currency = currency.into();

        for (name, value) in
            [("source_id", &source_id), ("external_id", &external_id), ("title", &title)]
        {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidCandidate(format!("{name} must not be blank")));
            }
        }
        if currency.trim().is_empty() {
            return Err(DomainError::InvalidCandidate(format!(
                "currency must not be blank for `{external_id}`"
            )));
        }
        if price.is_sign_negative() && !price.is_zero() {
            return Err(DomainError::InvalidCandidate(format!(
                "price {price} for `{external_id}` is negative"
            )));
        }

        Ok(Self {
            source_id,
            external_id,
            title,
            price,
            currency,
            delivery_estimate_in_days: None,
            image_url: None,
            product_url: None,
            variant: Variant::default(),
        })
    }

    pub fn with_delivery_estimate(mut self, days: u32) -> Self {
        self.delivery_estimate_in_days = Some(days);
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_product_url(mut self, url: impl Into<String>) -> Self {
        self.product_url = Some(url.into());
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn delivery_estimate_in_days(&self) -> Option<u32> {
        self.delivery_estimate_in_days
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn product_url(&self) -> Option<&str> {
        self.product_url.as_deref()
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }
}

/// Wire shape accepted from untyped sources before validation.
#[derive(Clone, Debug, Deserialize)]
pub struct CandidatePayload {
    pub external_id: String,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub delivery_estimate_in_days: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub variant: Variant,
}

impl CandidatePayload {
    pub fn into_candidate(self, source_id: &str) -> Result<Candidate, DomainError> {
        let mut candidate =
            Candidate::new(source_id, self.external_id, self.title, self.price, self.currency)?
                .with_variant(self.variant);
        if let Some(days) = self.delivery_estimate_in_days {
            candidate = candidate.with_delivery_estimate(days);
        }
        if let Some(url) = self.image_url {
            candidate = candidate.with_image_url(url);
        }
        if let Some(url) = self.product_url {
            candidate = candidate.with_product_url(url);
        }
        Ok(candidate)
    }
}

/// Per-criterion scores, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub cost: f64,
    pub delivery: f64,
    pub preference: f64,
    pub coherence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub explanation: String,
}
