use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Product category of a brief. Anything outside the four known values is kept
/// verbatim as a specialization chosen by the extractor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Clothing,
    Food,
    Both,
    Other,
    Specialized(String),
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }

        let category = match trimmed.to_ascii_lowercase().as_str() {
            "clothing" => Self::Clothing,
            "food" => Self::Food,
            "both" => Self::Both,
            "other" => Self::Other,
            _ => Self::Specialized(trimmed.to_string()),
        };
        Some(category)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Clothing => "clothing",
            Self::Food => "food",
            Self::Both => "both",
            Self::Other => "other",
            Self::Specialized(value) => value,
        }
    }

    pub fn includes_clothing(&self) -> bool {
        !matches!(self, Self::Food)
    }

    pub fn includes_food(&self) -> bool {
        !matches!(self, Self::Clothing)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or(Self::Other)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

/// Ordered, duplicate-free list of strings. Equality is exact and case-sensitive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderedSet(Vec<String>);

impl OrderedSet {
    /// Appends `value` unless an identical string is already present.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.0.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|existing| existing == value)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a OrderedSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Canonical shopping brief accumulated over a conversation.
///
/// Fields are only written through [`crate::requirements::IntentUpdateApplier`];
/// once [`RequirementSpec::mark_complete`] has been called the brief is frozen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RequirementSpec {
    pub(crate) budget_min: Option<Decimal>,
    pub(crate) budget_max: Option<Decimal>,
    pub(crate) budget_currency: Option<String>,
    pub(crate) delivery_deadline: Option<NaiveDate>,
    pub(crate) category: Option<Category>,
    pub(crate) country: Option<String>,
    pub(crate) city: Option<String>,
    pub(crate) event_type: Option<String>,
    pub(crate) event_name: Option<String>,
    pub(crate) people_count: Option<u32>,
    pub(crate) reason: Option<String>,
    pub(crate) preferences: OrderedSet,
    pub(crate) must_haves: OrderedSet,
    pub(crate) nice_to_haves: OrderedSet,
    pub(crate) is_complete: bool,
}

impl RequirementSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn budget_min(&self) -> Option<Decimal> {
        self.budget_min
    }

    pub fn budget_max(&self) -> Option<Decimal> {
        self.budget_max
    }

    pub fn budget_currency(&self) -> Option<&str> {
        self.budget_currency.as_deref()
    }

    pub fn delivery_deadline(&self) -> Option<NaiveDate> {
        self.delivery_deadline
    }

    pub fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn people_count(&self) -> Option<u32> {
        self.people_count
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn preferences(&self) -> &OrderedSet {
        &self.preferences
    }

    pub fn must_haves(&self) -> &OrderedSet {
        &self.must_haves
    }

    pub fn nice_to_haves(&self) -> &OrderedSet {
        &self.nice_to_haves
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// Freezes the brief. There is no way back to an open brief.
    pub fn mark_complete(&mut self) {
        self.is_complete = true;
    }

    /// Preference and must-have keywords, in that order, used for title matching.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.preferences.iter().chain(self.must_haves.iter()).map(String::as_str)
    }

    /// Flat field-to-value mapping with nulls included, for display and debugging.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
