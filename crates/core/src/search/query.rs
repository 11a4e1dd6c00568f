use crate::domain::requirement::{Category, RequirementSpec};
use crate::search::SearchConstraints;

pub const FALLBACK_QUERY: &str = "outfit clothing";
const DEFAULT_CURRENCY: &str = "EUR";

/// Query text plus constraints derived from a complete brief.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub constraints: SearchConstraints,
}

impl SearchQuery {
    pub fn from_spec(spec: &RequirementSpec, limit: usize) -> Self {
        Self { text: query_text(spec), constraints: constraints(spec, limit) }
    }
}

fn query_text(spec: &RequirementSpec) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.extend(spec.reason());
    parts.extend(spec.event_type());
    parts.extend(spec.preferences().iter().take(3).map(String::as_str));
    parts.extend(spec.must_haves().iter().take(2).map(String::as_str));
    if let Some(category) = spec.category().filter(|category| **category != Category::Other) {
        parts.push(category.as_str());
    }

    let text = parts.join(" ");
    if text.trim().is_empty() {
        FALLBACK_QUERY.to_string()
    } else {
        text
    }
}

fn constraints(spec: &RequirementSpec, limit: usize) -> SearchConstraints {
    SearchConstraints {
        category: spec.category().cloned(),
        currency: spec.budget_currency().unwrap_or(DEFAULT_CURRENCY).to_string(),
        country: spec.country().map(str::to_string),
        price_min: spec.budget_min(),
        price_max: spec.budget_max(),
        limit,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{SearchQuery, FALLBACK_QUERY};
    use crate::domain::requirement::{Category, RequirementSpec};
    use crate::domain::update::{FieldUpdate, UpdateEvent};
    use crate::requirements::IntentUpdateApplier;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn empty_brief_falls_back_to_generic_query() {
        let query = SearchQuery::from_spec(&RequirementSpec::new(), 5);
        assert_eq!(query.text, FALLBACK_QUERY);
        assert_eq!(query.constraints.currency, "EUR");
        assert_eq!(query.constraints.limit, 5);
        assert_eq!(query.constraints.price_max, None);
    }

    #[test]
    fn joins_reason_event_preferences_must_haves_and_category() {
        let spec = IntentUpdateApplier::new().applied(
            &RequirementSpec::new(),
            &UpdateEvent::new()
                .with(FieldUpdate::Reason("ski".to_string()))
                .with(FieldUpdate::EventType("trip".to_string()))
                .with(FieldUpdate::Preferences(strings(&["warm", "Size M", "black", "slim"])))
                .with(FieldUpdate::MustHaves(strings(&["jacket", "gloves", "helmet"])))
                .with(FieldUpdate::Category(Category::Clothing))
                .with(FieldUpdate::BudgetCurrency("CHF".to_string()))
                .with(FieldUpdate::BudgetMax(Decimal::from(400)))
                .with(FieldUpdate::Country("CH".to_string())),
        );

        let query = SearchQuery::from_spec(&spec, 10);
        assert_eq!(query.text, "ski trip warm Size M black jacket gloves clothing");
        assert_eq!(query.constraints.currency, "CHF");
        assert_eq!(query.constraints.country.as_deref(), Some("CH"));
        assert_eq!(query.constraints.price_max, Some(Decimal::from(400)));
        assert_eq!(query.constraints.category, Some(Category::Clothing));
    }

    #[test]
    fn other_category_is_left_out_of_query_text() {
        let spec = IntentUpdateApplier::new().applied(
            &RequirementSpec::new(),
            &UpdateEvent::new()
                .with(FieldUpdate::Category(Category::Other))
                .with(FieldUpdate::Reason("gift".to_string())),
        );
        assert_eq!(SearchQuery::from_spec(&spec, 10).text, "gift");
    }
}
