//! Multi-source ranking
//!
//! Scores merged candidates on four criteria (cost, delivery, preference match and
//! price coherence), combines them with configurable weights and explains the order.

mod criteria;
mod explain;

pub use criteria::{coherence_scores, cost_score, delivery_score, preference_score};
pub use explain::{candidate_explanation, ranking_explanation, why_first};

use std::cmp::Ordering;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::candidate::{Candidate, RankedCandidate, ScoreBreakdown};
use crate::domain::requirement::RequirementSpec;
use crate::search::SourceOutcome;

/// Weights for the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    /// Budget fit (default: 0.35)
    pub cost: f64,
    /// Arrival before the deadline (default: 0.35)
    pub delivery: f64,
    /// Keyword match against the title (default: 0.20)
    pub preference: f64,
    /// Closeness to the batch mean price (default: 0.10)
    pub coherence: f64,
}

/// Default ranking weights
pub const DEFAULT_WEIGHTS: RankingWeights =
    RankingWeights { cost: 0.35, delivery: 0.35, preference: 0.20, coherence: 0.10 };

impl Default for RankingWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl RankingWeights {
    pub fn composite(&self, breakdown: &ScoreBreakdown) -> f64 {
        self.cost * breakdown.cost
            + self.delivery * breakdown.delivery
            + self.preference * breakdown.preference
            + self.coherence * breakdown.coherence
    }
}

/// Result surface handed to clients after a search.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResult {
    pub requirements: Value,
    pub products: Vec<RankedCandidate>,
    pub ranking_explanation: String,
    pub why_first: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceOutcome>,
}

/// Stateless ranking engine
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    weights: RankingWeights,
}

impl RankingEngine {
    /// Create a ranking engine with default weights
    pub fn new() -> Self {
        Self { weights: RankingWeights::default() }
    }

    /// Create with custom weights
    pub fn with_weights(weights: RankingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    /// Rank against today's UTC date
    pub fn rank(&self, candidates: &[Candidate], spec: &RequirementSpec) -> Vec<RankedCandidate> {
        self.rank_on(candidates, spec, Utc::now().date_naive())
    }

    /// Rank descending by composite score. Ties keep input order.
    pub fn rank_on(
        &self,
        candidates: &[Candidate],
        spec: &RequirementSpec,
        today: NaiveDate,
    ) -> Vec<RankedCandidate> {
        let coherence = coherence_scores(candidates);

        let mut ranked: Vec<RankedCandidate> = candidates
            .iter()
            .zip(coherence)
            .map(|(candidate, coherence)| {
                let breakdown = ScoreBreakdown {
                    cost: cost_score(candidate, spec.budget_max()),
                    delivery: delivery_score(candidate, spec.delivery_deadline(), today),
                    preference: preference_score(candidate, spec),
                    coherence,
                };
                let score = round4(self.weights.composite(&breakdown));
                RankedCandidate {
                    candidate: candidate.clone(),
                    score,
                    explanation: candidate_explanation(candidate, &breakdown),
                    breakdown,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
    }

    pub fn ranking_explanation(&self) -> String {
        ranking_explanation(&self.weights)
    }

    /// Rank and wrap everything a client needs to display the result.
    pub fn search_result(
        &self,
        candidates: &[Candidate],
        spec: &RequirementSpec,
        today: NaiveDate,
    ) -> SearchResult {
        let products = self.rank_on(candidates, spec, today);
        SearchResult {
            requirements: spec.snapshot(),
            why_first: why_first(&products),
            ranking_explanation: self.ranking_explanation(),
            products,
            sources: Vec::new(),
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{RankingEngine, RankingWeights, DEFAULT_WEIGHTS};
    use crate::domain::candidate::Candidate;
    use crate::domain::requirement::RequirementSpec;
    use crate::domain::update::{FieldUpdate, UpdateEvent};
    use crate::requirements::IntentUpdateApplier;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date")
    }

    fn spec() -> RequirementSpec {
        IntentUpdateApplier::new().applied(
            &RequirementSpec::new(),
            &UpdateEvent::new()
                .with(FieldUpdate::BudgetMax(Decimal::from(100)))
                .with(FieldUpdate::DeliveryDeadline(
                    NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date"),
                ))
                .with(FieldUpdate::Preferences(vec!["jacket".to_string()])),
        )
    }

    #[test]
    fn cheaper_on_time_match_outranks_expensive_late_one() {
        let a = Candidate::new("stylehub", "a", "Ski Jacket", Decimal::from(90), "EUR")
            .expect("valid")
            .with_delivery_estimate(3);
        let b = Candidate::new("sportdirect", "b", "Ski Jacket Pro", Decimal::from(180), "EUR")
            .expect("valid")
            .with_delivery_estimate(12);

        let ranked = RankingEngine::new().rank_on(&[b, a], &spec(), today());

        assert_eq!(ranked[0].candidate.external_id(), "a");
        assert!(ranked[0].score > ranked[1].score);
        assert_eq!(ranked[0].breakdown.cost, 1.0);
        assert_eq!(ranked[0].breakdown.delivery, 1.0);
        assert_eq!(
            ranked[0].explanation,
            "Price: within budget, Delivery: 3 days, Preference match: 100%."
        );
        assert!(ranked[1].explanation.starts_with("Price: over budget"));
    }

    #[test]
    fn within_budget_beats_faster_over_budget_when_both_arrive_on_time() {
        let spec = IntentUpdateApplier::new().applied(
            &RequirementSpec::new(),
            &UpdateEvent::new()
                .with(FieldUpdate::BudgetMax(Decimal::from(100)))
                .with(FieldUpdate::DeliveryDeadline(
                    NaiveDate::from_ymd_opt(2025, 12, 20).expect("valid date"),
                )),
        );
        let today = NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date");
        let a = Candidate::new("stylehub", "a", "Parka", Decimal::from(90), "EUR")
            .expect("valid")
            .with_delivery_estimate(5);
        let b = Candidate::new("sportdirect", "b", "Parka", Decimal::from(150), "EUR")
            .expect("valid")
            .with_delivery_estimate(3);

        let ranked = RankingEngine::new().rank_on(&[b, a], &spec, today);

        let scores: Vec<_> =
            ranked.iter().map(|item| (item.candidate.external_id(), item.score)).collect();
        assert_eq!(scores, vec![("a", 0.875), ("b", 0.7583)]);
        assert_eq!(ranked[1].breakdown.delivery, 1.0);
        assert!(ranked[1].breakdown.cost < ranked[0].breakdown.cost);
    }

    #[test]
    fn ties_keep_input_order() {
        let make = |id: &str| {
            Candidate::new("s", id, "Same", Decimal::from(10), "EUR").expect("valid candidate")
        };
        let ranked = RankingEngine::new().rank_on(
            &[make("first"), make("second"), make("third")],
            &RequirementSpec::new(),
            today(),
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.candidate.external_id()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn scores_are_rounded_to_four_decimals() {
        let a = Candidate::new("s", "a", "Coat", Decimal::from(30), "EUR").expect("valid");
        let b = Candidate::new("s", "b", "Hat", Decimal::from(70), "EUR").expect("valid");
        let ranked = RankingEngine::new().rank_on(&[a, b], &RequirementSpec::new(), today());

        for item in &ranked {
            let scaled = item.score * 10_000.0;
            assert!((scaled - scaled.round()).abs() < 1e-6, "{} not rounded", item.score);
        }
    }

    #[test]
    fn missing_optional_fields_never_fail() {
        let bare = Candidate::new("s", "x", "Thing", Decimal::ZERO, "EUR").expect("valid");
        let ranked = RankingEngine::new().rank_on(&[bare], &RequirementSpec::new(), today());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].breakdown.delivery, 0.5);
        assert_eq!(ranked[0].breakdown.coherence, 1.0);
        assert!(RankingEngine::new().rank_on(&[], &spec(), today()).is_empty());
    }

    #[test]
    fn custom_weights_change_the_order() {
        let cheap_late = Candidate::new("s", "cheap", "Hat", Decimal::from(20), "EUR")
            .expect("valid")
            .with_delivery_estimate(30);
        let pricey_fast = Candidate::new("s", "fast", "Hat", Decimal::from(400), "EUR")
            .expect("valid")
            .with_delivery_estimate(1);

        let delivery_only = RankingEngine::with_weights(RankingWeights {
            cost: 0.0,
            delivery: 1.0,
            preference: 0.0,
            coherence: 0.0,
        });
        let ranked =
            delivery_only.rank_on(&[cheap_late.clone(), pricey_fast.clone()], &spec(), today());
        assert_eq!(ranked[0].candidate.external_id(), "fast");

        let cost_only = RankingEngine::with_weights(RankingWeights {
            cost: 1.0,
            delivery: 0.0,
            preference: 0.0,
            coherence: 0.0,
        });
        let ranked = cost_only.rank_on(&[pricey_fast, cheap_late], &spec(), today());
        assert_eq!(ranked[0].candidate.external_id(), "cheap");
        assert_eq!(RankingEngine::new().weights(), &DEFAULT_WEIGHTS);
    }

    #[test]
    fn search_result_wraps_snapshot_and_explanations() {
        let a = Candidate::new("stylehub", "a", "Jacket", Decimal::from(50), "EUR").expect("valid");
        let result = RankingEngine::new().search_result(&[a], &spec(), today());

        assert_eq!(result.products.len(), 1);
        assert!(result.why_first.starts_with("#1: Jacket (stylehub, 50 EUR)."));
        assert_eq!(result.requirements["budget_max"], serde_json::json!("100"));
        assert!(result.ranking_explanation.contains("35%"));
    }
}
