use std::collections::BTreeMap;

use serde_json::{json, Value};
use shopwise_core::domain::update::UpdateEvent;

pub const UPDATE_REQUIREMENTS: &str = "update_shopping_requirements";
pub const MARK_COMPLETE: &str = "mark_requirements_complete";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolEffect {
    Update(UpdateEvent),
    Complete,
}

/// A function the language model may call. Tools only describe changes; the
/// runtime decides whether and how they are applied.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;
    fn invoke(&self, arguments: &Value) -> ToolEffect;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateShoppingRequirements;

impl Tool for UpdateShoppingRequirements {
    fn name(&self) -> &'static str {
        UPDATE_REQUIREMENTS
    }

    fn description(&self) -> &'static str {
        "Update the shopping brief from the user's message. Only pass fields that were \
         mentioned or can be inferred."
    }

    fn parameters(&self) -> Value {
        let strings = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "properties": {
                "budget_min": {"type": "number", "description": "Minimum budget"},
                "budget_max": {"type": "number", "description": "Maximum budget"},
                "budget_currency": {"type": "string", "description": "Currency (EUR, USD, GBP)"},
                "delivery_deadline": {"type": "string", "description": "Deadline as YYYY-MM-DD"},
                "category": {
                    "type": "string",
                    "enum": ["clothing", "food", "both", "other"],
                },
                "country": {"type": "string"},
                "city": {"type": "string"},
                "event_type": {"type": "string", "description": "Kind of occasion"},
                "event_name": {"type": "string", "description": "Name of the event"},
                "people_count": {"type": "integer", "description": "Number of people"},
                "reason": {"type": "string", "description": "Why the user is shopping"},
                "preferences": strings.clone(),
                "must_haves": strings.clone(),
                "nice_to_haves": strings,
            },
        })
    }

    fn invoke(&self, arguments: &Value) -> ToolEffect {
        ToolEffect::Update(UpdateEvent::from_json(arguments))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MarkRequirementsComplete;

impl Tool for MarkRequirementsComplete {
    fn name(&self) -> &'static str {
        MARK_COMPLETE
    }

    fn description(&self) -> &'static str {
        "Mark the brief as complete once enough is known or the user has nothing to add."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn invoke(&self, _arguments: &Value) -> ToolEffect {
        ToolEffect::Complete
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with both requirement tools.
    pub fn shopping() -> Self {
        let mut registry = Self::default();
        registry.register(UpdateShoppingRequirements);
        registry.register(MarkRequirementsComplete);
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    /// `None` for tools that are not registered.
    pub fn dispatch(&self, name: &str, arguments: &Value) -> Option<ToolEffect> {
        self.get(name).map(|tool| tool.invoke(arguments))
    }

    pub fn describe(&self) -> Value {
        Value::Array(
            self.tools
                .values()
                .map(|tool| {
                    json!({
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    })
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;
    use shopwise_core::domain::update::FieldUpdate;

    use super::{ToolEffect, ToolRegistry, MARK_COMPLETE, UPDATE_REQUIREMENTS};

    #[test]
    fn shopping_registry_exposes_both_tools() {
        let registry = ToolRegistry::shopping();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());

        let described = registry.describe();
        let names: Vec<_> =
            described.as_array().expect("array").iter().map(|tool| tool["name"].clone()).collect();
        assert_eq!(names, vec![json!(MARK_COMPLETE), json!(UPDATE_REQUIREMENTS)]);
        assert_eq!(described[1]["parameters"]["properties"]["category"]["enum"][2], "both");
    }

    #[test]
    fn update_tool_validates_arguments() {
        let registry = ToolRegistry::shopping();
        let effect = registry
            .dispatch(
                UPDATE_REQUIREMENTS,
                &json!({"budget_max": 400, "people_count": -2, "colour": "red"}),
            )
            .expect("registered");

        let ToolEffect::Update(event) = effect else {
            panic!("expected an update effect");
        };
        assert_eq!(event.updates(), &[FieldUpdate::BudgetMax(Decimal::from(400))]);
        assert_eq!(event.rejections().len(), 2);
    }

    #[test]
    fn completion_tool_and_unknown_tools() {
        let registry = ToolRegistry::shopping();
        assert_eq!(registry.dispatch(MARK_COMPLETE, &json!({})), Some(ToolEffect::Complete));
        assert_eq!(registry.dispatch("checkout", &json!({})), None);
    }
}
