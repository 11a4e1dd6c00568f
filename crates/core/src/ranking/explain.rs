use crate::domain::candidate::{Candidate, RankedCandidate, ScoreBreakdown};
use crate::ranking::RankingWeights;

const WITHIN_BUDGET_THRESHOLD: f64 = 0.9;

/// One-sentence justification for a single candidate.
pub fn candidate_explanation(candidate: &Candidate, breakdown: &ScoreBreakdown) -> String {
    let price =
        if breakdown.cost >= WITHIN_BUDGET_THRESHOLD { "within budget" } else { "over budget" };
    let delivery = candidate
        .delivery_estimate_in_days()
        .map_or_else(|| "?".to_string(), |days| days.to_string());
    format!(
        "Price: {price}, Delivery: {delivery} days, Preference match: {}.",
        percent(breakdown.preference)
    )
}

/// Why the top candidate is on top.
pub fn why_first(ranked: &[RankedCandidate]) -> String {
    let Some(first) = ranked.first() else {
        return "No products to rank.".to_string();
    };
    let candidate = &first.candidate;
    format!(
        "#1: {} ({}, {} {}). Score: {:.2} (cost: {:.2}, delivery: {:.2}, preference: {:.2}). {}",
        candidate.title(),
        candidate.source_id(),
        candidate.price(),
        candidate.currency(),
        first.score,
        first.breakdown.cost,
        first.breakdown.delivery,
        first.breakdown.preference,
        first.explanation
    )
}

pub fn ranking_explanation(weights: &RankingWeights) -> String {
    format!(
        "Products are ranked by cost fit ({}), delivery before the deadline ({}), \
         preference match ({}) and price coherence within the results ({}).",
        percent(weights.cost),
        percent(weights.delivery),
        percent(weights.preference),
        percent(weights.coherence)
    )
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}
