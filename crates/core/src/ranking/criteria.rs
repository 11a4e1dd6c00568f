//! Per-criterion scores. Every function returns a value in `[0, 1]`.

use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::candidate::Candidate;
use crate::domain::requirement::RequirementSpec;

const NEUTRAL: f64 = 0.5;
const LATE_DELIVERY_WINDOW_DAYS: f64 = 14.0;

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// 1.0 within budget, otherwise `budget_max / price`.
pub fn cost_score(candidate: &Candidate, budget_max: Option<Decimal>) -> f64 {
    let Some(budget) = budget_max.filter(|budget| *budget > Decimal::ZERO) else {
        return 1.0;
    };
    if candidate.price() <= budget {
        return 1.0;
    }
    (to_f64(budget) / to_f64(candidate.price())).clamp(0.0, 1.0)
}

/// 1.0 when the estimate lands on or before the deadline, decaying to 0 over two weeks.
/// An arrival past the last representable date counts as maximally late.
pub fn delivery_score(candidate: &Candidate, deadline: Option<NaiveDate>, today: NaiveDate) -> f64 {
    let (Some(deadline), Some(days)) = (deadline, candidate.delivery_estimate_in_days()) else {
        return NEUTRAL;
    };
    let Some(arrival) = today.checked_add_days(Days::new(u64::from(days))) else {
        return 0.0;
    };
    if arrival <= deadline {
        return 1.0;
    }
    let days_late = (arrival - deadline).num_days() as f64;
    (1.0 - days_late / LATE_DELIVERY_WINDOW_DAYS).max(0.0)
}

/// Share of preference and must-have keywords found in the title, mapped onto `[0.5, 1]`.
pub fn preference_score(candidate: &Candidate, spec: &RequirementSpec) -> f64 {
    let keywords: Vec<String> = spec.keywords().map(str::to_lowercase).collect();
    if keywords.is_empty() {
        return NEUTRAL;
    }
    let title = candidate.title().to_lowercase();
    let hits = keywords.iter().filter(|keyword| title.contains(keyword.as_str())).count();
    (NEUTRAL + NEUTRAL * hits as f64 / keywords.len() as f64).min(1.0)
}

/// Closeness of each price to the batch mean.
pub fn coherence_scores(candidates: &[Candidate]) -> Vec<f64> {
    if candidates.len() <= 1 {
        return vec![1.0; candidates.len()];
    }
    let prices: Vec<f64> = candidates.iter().map(|candidate| to_f64(candidate.price())).collect();
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    if mean == 0.0 {
        return vec![1.0; candidates.len()];
    }
    prices.iter().map(|price| (1.0 - (price - mean).abs() / mean).max(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{coherence_scores, cost_score, delivery_score, preference_score};
    use crate::domain::candidate::Candidate;
    use crate::domain::requirement::RequirementSpec;
    use crate::domain::update::{FieldUpdate, UpdateEvent};
    use crate::requirements::IntentUpdateApplier;

    fn priced(title: &str, price: i64) -> Candidate {
        Candidate::new("s", title, title, Decimal::from(price), "EUR").expect("valid candidate")
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).expect("valid date")
    }

    #[test]
    fn cost_is_full_at_budget_and_half_at_double() {
        let budget = Some(Decimal::from(100));
        assert_eq!(cost_score(&priced("a", 100), budget), 1.0);
        assert!((cost_score(&priced("b", 200), budget) - 0.5).abs() < 1e-9);
        assert_eq!(cost_score(&priced("c", 900), None), 1.0);
        assert_eq!(cost_score(&priced("d", 900), Some(Decimal::ZERO)), 1.0);
    }

    #[test]
    fn delivery_is_full_neutral_or_zero() {
        let today = date(1);
        let on_time = priced("a", 1).with_delivery_estimate(3);
        assert_eq!(delivery_score(&on_time, Some(date(4)), today), 1.0);
        assert_eq!(delivery_score(&priced("b", 1), Some(date(4)), today), 0.5);
        assert_eq!(delivery_score(&on_time, None, today), 0.5);

        let very_late = priced("c", 1).with_delivery_estimate(20);
        assert_eq!(delivery_score(&very_late, Some(date(2)), today), 0.0);

        let a_week_late = priced("d", 1).with_delivery_estimate(10);
        assert!((delivery_score(&a_week_late, Some(date(4)), today) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn delivery_reaches_zero_exactly_two_weeks_late() {
        let today = date(1);
        let thirteen_late = priced("a", 1).with_delivery_estimate(16);
        let fourteen_late = priced("b", 1).with_delivery_estimate(17);
        assert!((delivery_score(&thirteen_late, Some(date(4)), today) - 1.0 / 14.0).abs() < 1e-9);
        assert_eq!(delivery_score(&fourteen_late, Some(date(4)), today), 0.0);
    }

    #[test]
    fn unrepresentable_arrival_scores_zero() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date");
        let deadline = NaiveDate::from_ymd_opt(2025, 12, 20).expect("valid date");
        let never = priced("a", 1).with_delivery_estimate(u32::MAX);
        assert_eq!(delivery_score(&never, Some(deadline), today), 0.0);

        let last_day = NaiveDate::MAX;
        let tomorrow = priced("b", 1).with_delivery_estimate(1);
        assert_eq!(delivery_score(&tomorrow, Some(last_day), last_day), 0.0);
    }

    #[test]
    fn preference_counts_case_insensitive_substring_hits() {
        let spec = IntentUpdateApplier::new().applied(
            &RequirementSpec::new(),
            &UpdateEvent::new()
                .with(FieldUpdate::Preferences(vec!["Wool".to_string()]))
                .with(FieldUpdate::MustHaves(vec!["coat".to_string()])),
        );

        assert_eq!(preference_score(&priced("Red wool coat", 1), &spec), 1.0);
        assert_eq!(preference_score(&priced("Rain coat", 1), &spec), 0.75);
        assert_eq!(preference_score(&priced("Hat", 1), &spec), 0.5);
        assert_eq!(preference_score(&priced("Hat", 1), &RequirementSpec::new()), 0.5);
    }

    #[test]
    fn coherence_measures_distance_from_mean() {
        assert_eq!(coherence_scores(&[priced("solo", 50)]), vec![1.0]);
        assert_eq!(coherence_scores(&[priced("a", 0), priced("b", 0)]), vec![1.0, 1.0]);

        let scores = coherence_scores(&[priced("a", 50), priced("b", 150)]);
        assert!((scores[0] - 0.5).abs() < 1e-9);
        assert!((scores[1] - 0.5).abs() < 1e-9);

        let outlier = coherence_scores(&[priced("a", 10), priced("b", 10), priced("c", 1000)]);
        assert!(outlier.iter().all(|score| (0.0..=1.0).contains(score)));
    }
}
