use serde_json::Value;
use shopwise_agent::runtime::AgentRuntime;
use shopwise_core::config::{AppConfig, LoadOptions};
use shopwise_core::domain::requirement::RequirementSpec;
use shopwise_core::domain::update::UpdateEvent;
use shopwise_core::requirements::IntentUpdateApplier;

use crate::commands::{block_on, CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_RUNTIME};

/// Freezes `brief` into a requirement spec and prints the ranked result as JSON.
pub fn run(options: LoadOptions, brief: &str) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "search",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let spec = match parse_brief(brief) {
        Ok(spec) => spec,
        Err(message) => {
            return CommandResult::failure("search", "invalid_brief", message, EXIT_INPUT)
        }
    };

    let runtime = match AgentRuntime::from_config(&config) {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "search",
                "runtime_init",
                format!("agent runtime setup failed: {error:#}"),
                EXIT_RUNTIME,
            )
        }
    };

    let result = match block_on(runtime.search_spec(&spec)) {
        Ok(result) => result,
        Err(error) => {
            return CommandResult::failure(
                "search",
                "runtime_init",
                format!("failed to start async runtime: {error}"),
                EXIT_RUNTIME,
            )
        }
    };

    match serde_json::to_string_pretty(&result) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure(
            "search",
            "serialization",
            format!("failed to serialize search result: {error}"),
            EXIT_RUNTIME,
        ),
    }
}

fn parse_brief(brief: &str) -> Result<RequirementSpec, String> {
    let value: Value =
        serde_json::from_str(brief).map_err(|error| format!("brief is not valid JSON: {error}"))?;
    if !value.is_object() {
        return Err("brief must be a JSON object of requirement fields".to_string());
    }

    let event = UpdateEvent::from_json(&value);
    if !event.rejections().is_empty() {
        let details = event
            .rejections()
            .iter()
            .map(|rejection| format!("{}: {}", rejection.field, rejection.detail))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(format!("brief has invalid fields: {details}"));
    }

    let mut spec = RequirementSpec::new();
    IntentUpdateApplier::new().apply(&mut spec, &event);
    spec.mark_complete();
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::parse_brief;

    #[test]
    fn brief_fields_freeze_into_a_complete_spec() {
        let spec = parse_brief(r#"{"reason": "ski trip", "budget_max": 300, "city": "Oslo"}"#)
            .expect("valid brief");
        assert!(spec.is_complete());
        assert_eq!(spec.reason(), Some("ski trip"));
        assert_eq!(spec.city(), Some("Oslo"));
        assert_eq!(spec.budget_max().map(|amount| amount.to_string()), Some("300".to_string()));
    }

    #[test]
    fn non_object_and_bad_fields_are_rejected() {
        let error = parse_brief("[1, 2]").expect_err("array brief");
        assert!(error.contains("JSON object"));

        let error = parse_brief("{not json").expect_err("malformed brief");
        assert!(error.contains("not valid JSON"));

        let error = parse_brief(r#"{"colour": "red", "people_count": 0}"#).expect_err("bad fields");
        assert!(error.contains("colour"));
        assert!(error.contains("people_count"));
    }
}
