use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopwise_core::domain::requirement::Category;
use shopwise_core::domain::update::{FieldUpdate, UpdateEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Ordered chat history of one session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message { role: Role::User, content: content.into() });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message { role: Role::Assistant, content: content.into() });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_user(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }

    pub fn user_turns(&self) -> u32 {
        let turns = self.messages.iter().filter(|message| message.role == Role::User).count();
        u32::try_from(turns).unwrap_or(u32::MAX)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedIntent {
    pub event: UpdateEvent,
    pub explicit_complete: bool,
}

/// Deterministic keyword heuristics for budgets, dates, occasions and wishes.
#[derive(Clone, Debug, Default)]
pub struct KeywordExtractor {
    today: Option<NaiveDate>,
}

impl KeywordExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the date relative deadlines ("in 5 days") are resolved against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn extract(&self, text: &str) -> ExtractedIntent {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let normalized_text = normalize_text(text);
        let tokens = tokenize(&normalized_text);
        let mut event = UpdateEvent::new();

        let budget = extract_budget(&tokens);
        if let Some(min) = budget.min {
            event.push(FieldUpdate::BudgetMin(min));
        }
        if let Some(max) = budget.max {
            event.push(FieldUpdate::BudgetMax(max));
        }
        if let Some(currency) = extract_currency(&normalized_text, &tokens) {
            event.push(FieldUpdate::BudgetCurrency(currency.to_string()));
        }
        if let Some(deadline) = extract_deadline(&normalized_text, &tokens, today) {
            event.push(FieldUpdate::DeliveryDeadline(deadline));
        }
        if let Some(count) = extract_people_count(&tokens) {
            event.push(FieldUpdate::PeopleCount(count));
        }
        if let Some(occasion) = extract_occasion(&tokens) {
            event.push(FieldUpdate::Reason(occasion.reason.to_string()));
            event.push(FieldUpdate::EventType(occasion.event_type.to_string()));
        }
        if let Some(category) = extract_category(&tokens) {
            event.push(FieldUpdate::Category(category));
        }

        let preferences = extract_preferences(&tokens);
        if !preferences.is_empty() {
            event.push(FieldUpdate::Preferences(preferences));
        }
        let must_haves = extract_clause_items(&normalized_text, &["must have", "must-have"]);
        if !must_haves.is_empty() {
            event.push(FieldUpdate::MustHaves(must_haves));
        }
        let nice_to_haves = extract_clause_items(&normalized_text, &["nice to have", "ideally"]);
        if !nice_to_haves.is_empty() {
            event.push(FieldUpdate::NiceToHaves(nice_to_haves));
        }

        let explicit_complete =
            COMPLETION_PHRASES.iter().any(|phrase| normalized_text.contains(phrase));

        ExtractedIntent { event, explicit_complete }
    }
}

const COMPLETION_PHRASES: [&str; 8] = [
    "that's all",
    "thats all",
    "that is all",
    "search now",
    "go ahead",
    "nothing else",
    "start the search",
    "ready to search",
];

const MAX_CONTEXT: [&str; 9] =
    ["budget", "under", "below", "max", "maximum", "spend", "around", "about", "upto"];

const MIN_CONTEXT: [&str; 3] = ["least", "min", "minimum"];

const PEOPLE_UNITS: [&str; 8] =
    ["people", "persons", "guests", "attendees", "participants", "kids", "adults", "friends"];

const COLOURS: [&str; 14] = [
    "black", "white", "red", "blue", "green", "yellow", "pink", "purple", "orange", "grey", "gray",
    "brown", "beige", "navy",
];

const STYLES: [&str; 10] = [
    "waterproof",
    "warm",
    "casual",
    "elegant",
    "sporty",
    "vintage",
    "breathable",
    "vegan",
    "vegetarian",
    "organic",
];

const CLOTHING_WORDS: [&str; 24] = [
    "outfit", "outfits", "jacket", "jackets", "clothes", "clothing", "shirt", "shirts", "dress",
    "shoes", "sneakers", "boots", "pants", "trousers", "jeans", "hoodie", "coat", "skirt", "socks",
    "jersey", "gloves", "hat", "beanie", "wear",
];

const FOOD_WORDS: [&str; 13] = [
    "snacks",
    "snack",
    "food",
    "drinks",
    "drink",
    "catering",
    "groceries",
    "pizza",
    "chips",
    "beverages",
    "coffee",
    "fruit",
    "sweets",
];

struct Occasion {
    phrase: &'static str,
    reason: &'static str,
    event_type: &'static str,
}

static OCCASIONS: [Occasion; 12] = [
    Occasion { phrase: "super bowl", reason: "super bowl party", event_type: "party" },
    Occasion { phrase: "hackathon", reason: "hackathon", event_type: "hackathon" },
    Occasion { phrase: "wedding", reason: "wedding", event_type: "wedding" },
    Occasion { phrase: "birthday", reason: "birthday", event_type: "party" },
    Occasion { phrase: "party", reason: "party", event_type: "party" },
    Occasion { phrase: "skiing", reason: "ski trip", event_type: "ski" },
    Occasion { phrase: "ski", reason: "ski trip", event_type: "ski" },
    Occasion { phrase: "hiking", reason: "hiking", event_type: "outdoor" },
    Occasion { phrase: "camping", reason: "camping", event_type: "outdoor" },
    Occasion { phrase: "conference", reason: "conference", event_type: "conference" },
    Occasion { phrase: "picnic", reason: "picnic", event_type: "picnic" },
    Occasion { phrase: "interview", reason: "job interview", event_type: "interview" },
];

fn normalize_text(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() || matches!(character, '€' | '$' | '£' | '.') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|token| token.trim_matches('.'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split(' ').collect();
    tokens.windows(words.len()).any(|window| window.iter().zip(&words).all(|(a, b)| a == b))
}

#[derive(Debug, Default)]
struct Budget {
    min: Option<Decimal>,
    max: Option<Decimal>,
}

fn extract_budget(tokens: &[String]) -> Budget {
    for window in tokens.windows(4) {
        if let [between, low, and, high] = window {
            if between != "between" || and != "and" {
                continue;
            }
            if let (Some(low), Some(high)) = (parse_money_token(low), parse_money_token(high)) {
                return Budget { min: Some(low.min(high)), max: Some(low.max(high)) };
            }
        }
    }

    let mut budget = Budget::default();
    for (index, token) in tokens.iter().enumerate() {
        let Some(amount) = parse_money_token(token) else {
            continue;
        };
        let previous = index.checked_sub(1).map(|i| tokens[i].as_str());
        let before_previous = index.checked_sub(2).map(|i| tokens[i].as_str());
        let next = tokens.get(index + 1).map(String::as_str);

        if previous.is_some_and(|word| MIN_CONTEXT.contains(&word)) {
            budget.min.get_or_insert(amount);
            continue;
        }

        let has_symbol = token.contains(['€', '$', '£']);
        let in_context = previous.is_some_and(|word| MAX_CONTEXT.contains(&word))
            || before_previous == Some("budget")
            || (before_previous == Some("up") && previous == Some("to"));
        let currency_follows = next.is_some_and(|word| currency_for_word(word).is_some());

        if has_symbol || in_context || currency_follows {
            budget.max.get_or_insert(amount);
        }
    }
    budget
}

fn parse_money_token(token: &str) -> Option<Decimal> {
    let trimmed = token.trim_matches(|character: char| matches!(character, '€' | '$' | '£'));
    if !trimmed.starts_with(|character: char| character.is_ascii_digit()) {
        return None;
    }

    let (number_part, multiplier) = match trimmed.strip_suffix('k') {
        Some(prefix) => (prefix, Decimal::from(1_000)),
        None => (trimmed, Decimal::ONE),
    };

    Decimal::from_str(number_part).ok().map(|amount| amount * multiplier)
}

fn currency_for_word(word: &str) -> Option<&'static str> {
    match word {
        "eur" | "euro" | "euros" => Some("EUR"),
        "usd" | "dollar" | "dollars" => Some("USD"),
        "gbp" | "pound" | "pounds" => Some("GBP"),
        _ => None,
    }
}

fn extract_currency(normalized_text: &str, tokens: &[String]) -> Option<&'static str> {
    if normalized_text.contains('€') {
        return Some("EUR");
    }
    if normalized_text.contains('$') {
        return Some("USD");
    }
    if normalized_text.contains('£') {
        return Some("GBP");
    }
    tokens.iter().find_map(|token| currency_for_word(token))
}

fn extract_deadline(
    normalized_text: &str,
    tokens: &[String],
    today: NaiveDate,
) -> Option<NaiveDate> {
    let explicit = normalized_text
        .split_whitespace()
        .map(|word| word.trim_matches(|character: char| !character.is_ascii_alphanumeric()))
        .find_map(|word| NaiveDate::parse_from_str(word, "%Y-%m-%d").ok());
    if explicit.is_some() {
        return explicit;
    }

    if tokens.iter().any(|token| token == "tomorrow") {
        return today.checked_add_days(Days::new(1));
    }

    for window in tokens.windows(3) {
        if let [preposition, amount, unit] = window {
            if preposition != "in" && preposition != "within" {
                continue;
            }
            let amount: Option<u64> = if amount == "a" || amount == "one" { Some(1) } else { amount.parse().ok() };
            let Some(amount) = amount else {
                continue;
            };
            let days = match unit.as_str() {
                "day" | "days" => Some(amount),
                "week" | "weeks" => amount.checked_mul(7),
                _ => continue,
            };
            let Some(days) = days else {
                continue;
            };
            return today.checked_add_days(Days::new(days));
        }
    }

    if contains_phrase(tokens, "next week") {
        return today.checked_add_days(Days::new(7));
    }

    for window in tokens.windows(2) {
        if let [by, day] = window {
            if by != "by" {
                continue;
            }
            if let Ok(weekday) = day.parse::<Weekday>() {
                return today.checked_add_days(Days::new(days_until(today.weekday(), weekday)));
            }
        }
    }

    None
}

/// Days to the next occurrence of `target`, never zero.
fn days_until(from: Weekday, target: Weekday) -> u64 {
    let ahead = (7 + target.num_days_from_monday() - from.num_days_from_monday()) % 7;
    if ahead == 0 {
        7
    } else {
        u64::from(ahead)
    }
}

fn extract_people_count(tokens: &[String]) -> Option<u32> {
    tokens.windows(2).find_map(|window| match window {
        [value, unit] if PEOPLE_UNITS.contains(&unit.as_str()) => {
            value.parse::<u32>().ok().filter(|count| *count > 0)
        }
        _ => None,
    })
}

fn extract_occasion(tokens: &[String]) -> Option<&'static Occasion> {
    OCCASIONS.iter().find(|occasion| contains_phrase(tokens, occasion.phrase))
}

fn extract_category(tokens: &[String]) -> Option<Category> {
    let clothing = tokens.iter().any(|token| CLOTHING_WORDS.contains(&token.as_str()));
    let food = tokens.iter().any(|token| FOOD_WORDS.contains(&token.as_str()));
    match (clothing, food) {
        (true, true) => Some(Category::Both),
        (true, false) => Some(Category::Clothing),
        (false, true) => Some(Category::Food),
        (false, false) => None,
    }
}

fn extract_preferences(tokens: &[String]) -> Vec<String> {
    let mut preferences: Vec<String> = Vec::new();
    let mut push = |value: String| {
        if !preferences.contains(&value) {
            preferences.push(value);
        }
    };

    for (index, token) in tokens.iter().enumerate() {
        if token == "size" {
            if let Some(size) = tokens.get(index + 1) {
                push(format!("size {}", size.to_uppercase()));
            }
        } else if COLOURS.contains(&token.as_str()) || STYLES.contains(&token.as_str()) {
            push(token.clone());
        }
    }
    preferences
}

/// Items listed after a marker phrase up to the end of the clause.
fn extract_clause_items(normalized_text: &str, markers: &[&str]) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for marker in markers {
        for (start, _) in normalized_text.match_indices(marker) {
            let rest = &normalized_text[start + marker.len()..];
            let clause = rest.split(['.', ',', ';', '!', '?']).next().unwrap_or_default();
            for item in clause.split(" and ") {
                let item = item.trim().trim_start_matches(':').trim();
                let item = ["a ", "an ", "the ", "some "]
                    .iter()
                    .find_map(|article| item.strip_prefix(article))
                    .unwrap_or(item)
                    .trim();
                if !item.is_empty() && !items.iter().any(|existing| existing == item) {
                    items.push(item.to_string());
                }
            }
        }
    }
    items
}
