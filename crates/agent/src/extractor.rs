use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use shopwise_core::domain::requirement::RequirementSpec;
use shopwise_core::domain::update::UpdateEvent;
use thiserror::Error;

use crate::conversation::{KeywordExtractor, Transcript};
use crate::llm::LlmClient;
use crate::tools::{ToolEffect, ToolRegistry};

/// What one extractor call learned from the latest user message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub updates: Vec<UpdateEvent>,
    pub complete: bool,
    pub reply: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("language model call failed: {0}")]
    Llm(String),
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(
        &self,
        transcript: &Transcript,
        spec: &RequirementSpec,
    ) -> Result<Extraction, ExtractionError>;
}

#[async_trait]
impl IntentExtractor for KeywordExtractor {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn extract(
        &self,
        transcript: &Transcript,
        _spec: &RequirementSpec,
    ) -> Result<Extraction, ExtractionError> {
        let Some(text) = transcript.last_user() else {
            return Ok(Extraction::default());
        };

        let intent = KeywordExtractor::extract(self, text);
        let updates = if intent.event.is_empty() { Vec::new() } else { vec![intent.event] };
        Ok(Extraction { updates, complete: intent.explicit_complete, reply: None })
    }
}

/// Asks a language model for a JSON reply carrying tool calls.
pub struct LlmExtractor<C> {
    client: C,
    tools: ToolRegistry,
    today: Option<NaiveDate>,
}

impl<C> LlmExtractor<C>
where
    C: LlmClient,
{
    pub fn new(client: C) -> Self {
        Self { client, tools: ToolRegistry::shopping(), today: None }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn system_prompt(&self, spec: &RequirementSpec) -> String {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let tools = serde_json::to_string_pretty(&self.tools.describe()).unwrap_or_default();
        let brief = serde_json::to_string_pretty(&spec.snapshot()).unwrap_or_default();

        format!(
            "You are the shopping agent of Shopwise. Help the user turn a wish into a concrete \
             shopping brief for a search across several retailers.\n\
             Today's date: {today}. Convert relative deadlines (\"by Friday\", \"in 5 days\") \
             to YYYY-MM-DD.\n\n\
             Collect: reason or event_type (what it is for), category (always one of clothing, \
             food, both, other), budget_min, budget_max, budget_currency, delivery_deadline, \
             preferences (style, brands, colours, sizes), must_haves, nice_to_haves and \
             people_count.\n\n\
             Rules:\n\
             - Extract everything relevant from each message and call \
             update_shopping_requirements.\n\
             - Call mark_requirements_complete once 3 or more parameters are filled, after at \
             most 2 follow-up questions, or when the user has nothing to add.\n\
             - Follow-up questions are at most 40 characters. Never ask for the category.\n\
             - Answer in the user's language. Only ask questions.\n\n\
             Respond with one JSON object and nothing else:\n\
             {{\"reply\": \"<question or empty>\", \"tool_calls\": [{{\"name\": \"<tool>\", \
             \"arguments\": {{}}}}]}}\n\n\
             Tools:\n{tools}\n\n\
             Current brief:\n{brief}\n"
        )
    }

    /// Turns raw model output into an extraction. Never fails: unreadable output
    /// yields no updates.
    pub fn interpret(&self, raw: &str) -> Extraction {
        let Some(object) = extract_json_object(raw) else {
            tracing::warn!(
                event_name = "agent.llm_output_unparseable",
                length = raw.len(),
                "model output contained no JSON object"
            );
            return Extraction::default();
        };

        let reply = object
            .get("reply")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|reply| !reply.is_empty())
            .map(str::to_string);

        let mut extraction = Extraction { reply, ..Extraction::default() };
        let calls = object.get("tool_calls").and_then(Value::as_array).cloned().unwrap_or_default();

        for call in calls {
            let Some(name) = call.get("name").and_then(Value::as_str) else {
                continue;
            };
            let arguments = call.get("arguments").cloned().unwrap_or(Value::Null);
            let arguments = match arguments {
                Value::String(encoded) => serde_json::from_str(&encoded).unwrap_or(Value::Null),
                other => other,
            };

            match self.tools.dispatch(name, &arguments) {
                Some(ToolEffect::Update(event)) => {
                    if !event.is_empty() || !event.rejections().is_empty() {
                        extraction.updates.push(event);
                    }
                }
                Some(ToolEffect::Complete) => extraction.complete = true,
                None => {
                    tracing::warn!(
                        event_name = "agent.unknown_tool",
                        tool = %name,
                        "ignoring call to unregistered tool"
                    );
                }
            }
        }

        extraction
    }
}

#[async_trait]
impl<C> IntentExtractor for LlmExtractor<C>
where
    C: LlmClient,
{
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(
        &self,
        transcript: &Transcript,
        spec: &RequirementSpec,
    ) -> Result<Extraction, ExtractionError> {
        let prompt = self.system_prompt(spec);
        let raw = self
            .client
            .complete(&prompt, transcript.messages())
            .await
            .map_err(|error| ExtractionError::Llm(format!("{error:#}")))?;
        Ok(self.interpret(&raw))
    }
}

/// Finds a JSON object in model output: a fenced block first, then the span
/// from the first `{` to the last `}`.
fn extract_json_object(raw: &str) -> Option<Value> {
    if let Some(start) = raw.find("```") {
        let after = &raw[start + 3..];
        let body_start = after.find('\n').map_or(0, |index| index + 1);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str(body[..end].trim()) {
                return Some(value);
            }
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&raw[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use shopwise_core::domain::requirement::RequirementSpec;
    use shopwise_core::domain::update::FieldUpdate;

    use super::{extract_json_object, ExtractionError, IntentExtractor, LlmExtractor};
    use crate::conversation::{KeywordExtractor, Message, Transcript};
    use crate::llm::LlmClient;

    struct ScriptedClient {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, system_prompt: &str, _messages: &[Message]) -> Result<String> {
            self.prompts.lock().expect("lock").push(system_prompt.to_string());
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }

    fn transcript(text: &str) -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push_user(text);
        transcript
    }

    #[tokio::test]
    async fn tool_calls_become_updates_and_completion() {
        let extractor = LlmExtractor::new(ScriptedClient::replying(
            r#"Sure! ```json
{"reply": "", "tool_calls": [
  {"name": "update_shopping_requirements", "arguments": {"budget_max": 400, "reason": "ski"}},
  {"name": "mark_requirements_complete", "arguments": {}},
  {"name": "place_order", "arguments": {}}
]}
```"#,
        ));

        let extraction = extractor
            .extract(&transcript("ski outfit for 400"), &RequirementSpec::new())
            .await
            .expect("extraction succeeds");

        assert!(extraction.complete);
        assert_eq!(extraction.reply, None);
        assert_eq!(extraction.updates.len(), 1);
        assert!(extraction.updates[0]
            .updates()
            .contains(&FieldUpdate::BudgetMax(Decimal::from(400))));
    }

    #[tokio::test]
    async fn prompt_carries_date_tools_and_current_brief() {
        let client = ScriptedClient::replying(r#"{"reply": "Budget?"}"#);
        let extractor = LlmExtractor::new(client)
            .with_today(NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date"));

        let extraction =
            extractor.extract(&transcript("hi"), &RequirementSpec::new()).await.expect("ok");
        assert_eq!(extraction.reply.as_deref(), Some("Budget?"));
        assert!(extraction.updates.is_empty());

        let prompts = extractor.client.prompts.lock().expect("lock").clone();
        assert!(prompts[0].contains("2025-01-10"));
        assert!(prompts[0].contains("update_shopping_requirements"));
        assert!(prompts[0].contains("\"budget_max\": null"));
    }

    #[tokio::test]
    async fn client_failure_is_reported() {
        let client = ScriptedClient {
            reply: Err("connection refused".to_string()),
            prompts: Mutex::new(Vec::new()),
        };
        let result =
            LlmExtractor::new(client).extract(&transcript("hi"), &RequirementSpec::new()).await;
        assert!(matches!(result, Err(ExtractionError::Llm(message)) if message.contains("refused")));
    }

    #[test]
    fn unparseable_output_yields_nothing() {
        let extractor = LlmExtractor::new(ScriptedClient::replying(""));
        let extraction = extractor.interpret("I think you want a jacket.");
        assert!(extraction.updates.is_empty());
        assert!(!extraction.complete);

        let stringly = extractor.interpret(
            r#"{"tool_calls": [{"name": "update_shopping_requirements",
                "arguments": "{\"people_count\": 60}"}]}"#,
        );
        assert_eq!(stringly.updates[0].updates(), &[FieldUpdate::PeopleCount(60)]);
    }

    #[test]
    fn json_object_is_found_between_braces() {
        assert!(extract_json_object("prefix {\"a\": 1} suffix").is_some());
        assert!(extract_json_object("[1, 2]").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }

    #[tokio::test]
    async fn keyword_extractor_reads_the_last_user_message() {
        let extractor = KeywordExtractor::new();
        let mut transcript = transcript("party outfit");
        transcript.push_assistant("What's your budget?");
        transcript.push_user("under 80 euro, that's all");

        let extraction =
            IntentExtractor::extract(&extractor, &transcript, &RequirementSpec::new())
                .await
                .expect("rules never fail");
        assert!(extraction.complete);
        assert_eq!(extraction.updates.len(), 1);
        assert!(extraction.updates[0]
            .updates()
            .contains(&FieldUpdate::BudgetMax(Decimal::from(80))));
        assert!(!extraction.updates[0].updates().iter().any(|update| matches!(
            update,
            FieldUpdate::Reason(_)
        )));

        let empty = IntentExtractor::extract(&extractor, &Transcript::new(), &RequirementSpec::new())
            .await
            .expect("rules never fail");
        assert!(empty.updates.is_empty());
    }
}
