use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::requirement::Category;

/// Every field an extractor is allowed to touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    BudgetMin,
    BudgetMax,
    BudgetCurrency,
    DeliveryDeadline,
    Category,
    Country,
    City,
    EventType,
    EventName,
    PeopleCount,
    Reason,
    Preferences,
    MustHaves,
    NiceToHaves,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Collection,
}

impl FieldName {
    pub const ALL: [FieldName; 14] = [
        Self::BudgetMin,
        Self::BudgetMax,
        Self::BudgetCurrency,
        Self::DeliveryDeadline,
        Self::Category,
        Self::Country,
        Self::City,
        Self::EventType,
        Self::EventName,
        Self::PeopleCount,
        Self::Reason,
        Self::Preferences,
        Self::MustHaves,
        Self::NiceToHaves,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BudgetMin => "budget_min",
            Self::BudgetMax => "budget_max",
            Self::BudgetCurrency => "budget_currency",
            Self::DeliveryDeadline => "delivery_deadline",
            Self::Category => "category",
            Self::Country => "country",
            Self::City => "city",
            Self::EventType => "event_type",
            Self::EventName => "event_name",
            Self::PeopleCount => "people_count",
            Self::Reason => "reason",
            Self::Preferences => "preferences",
            Self::MustHaves => "must_haves",
            Self::NiceToHaves => "nice_to_haves",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Preferences | Self::MustHaves | Self::NiceToHaves => FieldKind::Collection,
            _ => FieldKind::Scalar,
        }
    }
}

impl FromStr for FieldName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| format!("unknown field `{value}`"))
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated field change. Scalar variants overwrite, collection variants union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldUpdate {
    BudgetMin(Decimal),
    BudgetMax(Decimal),
    BudgetCurrency(String),
    DeliveryDeadline(NaiveDate),
    Category(Category),
    Country(String),
    City(String),
    EventType(String),
    EventName(String),
    PeopleCount(u32),
    Reason(String),
    Preferences(Vec<String>),
    MustHaves(Vec<String>),
    NiceToHaves(Vec<String>),
}

impl FieldUpdate {
    pub fn field(&self) -> FieldName {
        match self {
            Self::BudgetMin(_) => FieldName::BudgetMin,
            Self::BudgetMax(_) => FieldName::BudgetMax,
            Self::BudgetCurrency(_) => FieldName::BudgetCurrency,
            Self::DeliveryDeadline(_) => FieldName::DeliveryDeadline,
            Self::Category(_) => FieldName::Category,
            Self::Country(_) => FieldName::Country,
            Self::City(_) => FieldName::City,
            Self::EventType(_) => FieldName::EventType,
            Self::EventName(_) => FieldName::EventName,
            Self::PeopleCount(_) => FieldName::PeopleCount,
            Self::Reason(_) => FieldName::Reason,
            Self::Preferences(_) => FieldName::Preferences,
            Self::MustHaves(_) => FieldName::MustHaves,
            Self::NiceToHaves(_) => FieldName::NiceToHaves,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    UnknownField,
    InvalidValue,
}

/// A field that was dropped at the event boundary. Kept only for logging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldRejection {
    pub field: String,
    pub reason: RejectionReason,
    pub detail: String,
}

/// A partial set of field changes produced by one extractor call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateEvent {
    updates: Vec<FieldUpdate>,
    rejections: Vec<FieldRejection>,
}

impl UpdateEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, update: FieldUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn push(&mut self, update: FieldUpdate) {
        self.updates.push(update);
    }

    pub fn updates(&self) -> &[FieldUpdate] {
        &self.updates
    }

    pub fn rejections(&self) -> &[FieldRejection] {
        &self.rejections
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Validates an untyped field map. Never fails: a bad field is recorded as a
    /// rejection and the remaining fields are kept.
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self {
                updates: Vec::new(),
                rejections: vec![FieldRejection {
                    field: "<event>".to_string(),
                    reason: RejectionReason::InvalidValue,
                    detail: "update event must be a JSON object".to_string(),
                }],
            };
        };
        Self::from_map(object)
    }

    pub fn from_map(object: &Map<String, Value>) -> Self {
        let mut event = Self::new();

        for (key, value) in object {
            let field = match key.parse::<FieldName>() {
                Ok(field) => field,
                Err(detail) => {
                    event.rejections.push(FieldRejection {
                        field: key.clone(),
                        reason: RejectionReason::UnknownField,
                        detail,
                    });
                    continue;
                }
            };

            if value.is_null() {
                continue;
            }

            match parse_field(field, value) {
                Ok(Some(update)) => event.updates.push(update),
                Ok(None) => {}
                Err(detail) => event.rejections.push(FieldRejection {
                    field: key.clone(),
                    reason: RejectionReason::InvalidValue,
                    detail,
                }),
            }
        }

        event
    }
}

fn parse_field(field: FieldName, value: &Value) -> Result<Option<FieldUpdate>, String> {
    let update = match field {
        FieldName::BudgetMin => FieldUpdate::BudgetMin(parse_amount(value)?),
        FieldName::BudgetMax => FieldUpdate::BudgetMax(parse_amount(value)?),
        FieldName::BudgetCurrency => FieldUpdate::BudgetCurrency(parse_text(value)?),
        FieldName::DeliveryDeadline => FieldUpdate::DeliveryDeadline(parse_date(value)?),
        FieldName::Category => {
            let text = parse_text(value)?;
            let category =
                Category::parse(&text).ok_or_else(|| "category must not be blank".to_string())?;
            FieldUpdate::Category(category)
        }
        FieldName::Country => FieldUpdate::Country(parse_text(value)?),
        FieldName::City => FieldUpdate::City(parse_text(value)?),
        FieldName::EventType => FieldUpdate::EventType(parse_text(value)?),
        FieldName::EventName => FieldUpdate::EventName(parse_text(value)?),
        FieldName::PeopleCount => FieldUpdate::PeopleCount(parse_people_count(value)?),
        FieldName::Reason => FieldUpdate::Reason(parse_text(value)?),
        FieldName::Preferences => {
            return Ok(parse_items(value)?.map(FieldUpdate::Preferences));
        }
        FieldName::MustHaves => return Ok(parse_items(value)?.map(FieldUpdate::MustHaves)),
        FieldName::NiceToHaves => return Ok(parse_items(value)?.map(FieldUpdate::NiceToHaves)),
    };
    Ok(Some(update))
}

fn parse_amount(value: &Value) -> Result<Decimal, String> {
    let amount = match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .map_err(|error| format!("amount `{number}` is not a decimal: {error}"))?,
        Value::String(text) => Decimal::from_str(text.trim())
            .map_err(|error| format!("amount `{text}` is not a decimal: {error}"))?,
        other => return Err(format!("amount must be a number, got {other}")),
    };

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("amount must not be negative, got {amount}"));
    }
    Ok(amount)
}

fn parse_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Ok(text.clone()),
        Value::String(_) => Err("value must not be blank".to_string()),
        other => Err(format!("value must be a string, got {other}")),
    }
}

fn parse_date(value: &Value) -> Result<NaiveDate, String> {
    let text = parse_text(value)?;
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|error| format!("date `{text}` is not YYYY-MM-DD: {error}"))
}

fn parse_people_count(value: &Value) -> Result<u32, String> {
    let count = value.as_u64().ok_or_else(|| format!("people_count must be an integer, got {value}"))?;
    if count == 0 {
        return Err("people_count must be positive".to_string());
    }
    u32::try_from(count).map_err(|_| format!("people_count {count} is out of range"))
}

fn parse_items(value: &Value) -> Result<Option<Vec<String>>, String> {
    let Value::Array(items) = value else {
        return Err(format!("collection must be an array, got {value}"));
    };

    let strings = items.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>();
    Ok((!strings.is_empty()).then_some(strings))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{FieldName, FieldUpdate, RejectionReason, UpdateEvent};
    use crate::domain::requirement::Category;

    #[test]
    fn parses_every_known_field() {
        let event = UpdateEvent::from_json(&json!({
            "budget_min": 50,
            "budget_max": "400.50",
            "budget_currency": "EUR",
            "delivery_deadline": "2025-12-20",
            "category": "clothing",
            "country": "DE",
            "city": "Berlin",
            "event_type": "ski trip",
            "event_name": "Alps week",
            "people_count": 4,
            "reason": "ski",
            "preferences": ["Size M", "waterproof"],
            "must_haves": ["jacket"],
            "nice_to_haves": ["goggles"]
        }));

        assert!(event.rejections().is_empty(), "unexpected rejections: {:?}", event.rejections());
        assert_eq!(event.updates().len(), 14);
        assert!(event.updates().contains(&FieldUpdate::BudgetMax(Decimal::new(40_050, 2))));
        assert!(event.updates().contains(&FieldUpdate::DeliveryDeadline(
            NaiveDate::from_ymd_opt(2025, 12, 20).expect("valid date")
        )));
        assert!(event.updates().contains(&FieldUpdate::Category(Category::Clothing)));
        assert!(event.updates().contains(&FieldUpdate::PeopleCount(4)));
    }

    #[test]
    fn unknown_and_malformed_fields_are_dropped_without_losing_good_ones() {
        let event = UpdateEvent::from_json(&json!({
            "budget_max": 100,
            "shoe_size": 42,
            "people_count": 0,
            "delivery_deadline": "next friday",
            "preferences": "blue"
        }));

        assert_eq!(event.updates(), &[FieldUpdate::BudgetMax(Decimal::from(100))]);
        assert_eq!(event.rejections().len(), 4);
        assert!(event
            .rejections()
            .iter()
            .any(|r| r.field == "shoe_size" && r.reason == RejectionReason::UnknownField));
        assert!(event
            .rejections()
            .iter()
            .any(|r| r.field == "people_count" && r.reason == RejectionReason::InvalidValue));
    }

    #[test]
    fn nulls_and_empty_collections_are_no_ops() {
        let event = UpdateEvent::from_json(&json!({
            "budget_max": null,
            "preferences": [],
            "must_haves": [1, 2]
        }));

        assert!(event.is_empty());
        assert!(event.rejections().is_empty());
    }

    #[test]
    fn non_string_collection_items_are_dropped_individually() {
        let event = UpdateEvent::from_json(&json!({ "preferences": ["red", 3, null, "Size M"] }));
        assert_eq!(
            event.updates(),
            &[FieldUpdate::Preferences(vec!["red".to_string(), "Size M".to_string()])]
        );
    }

    #[test]
    fn negative_budget_is_rejected() {
        let event = UpdateEvent::from_json(&json!({ "budget_max": -5 }));
        assert!(event.is_empty());
        assert_eq!(event.rejections()[0].reason, RejectionReason::InvalidValue);
    }

    #[test]
    fn non_object_event_is_empty() {
        let event = UpdateEvent::from_json(&json!(["budget_max", 10]));
        assert!(event.is_empty());
        assert_eq!(event.rejections().len(), 1);
    }

    #[test]
    fn field_names_round_trip() {
        for field in FieldName::ALL {
            assert_eq!(field.as_str().parse::<FieldName>(), Ok(field));
        }
    }
}
