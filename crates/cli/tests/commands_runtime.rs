use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use shopwise_cli::commands::{config, doctor, search, smoke};
use shopwise_core::config::LoadOptions;

#[test]
fn smoke_returns_success_report_with_rule_based_extractor() {
    with_env(&[("SHOPWISE_LLM_PROVIDER", "rules")], || {
        let result = smoke::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");

        let names = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .map(|check| check["name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["config_validation", "runtime_init", "conversation", "search", "cart"]);
    });
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("SHOPWISE_LLM_PROVIDER", "openai")], || {
        let result = smoke::run(LoadOptions::default());
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn search_prints_ranked_result_for_a_brief() {
    with_env(&[], || {
        let result = search::run(
            LoadOptions::default(),
            r#"{"reason": "ski trip", "category": "clothing", "budget_max": 300}"#,
        );
        assert_eq!(result.exit_code, 0, "expected successful search: {}", result.output);

        let payload = parse_payload(&result.output);
        assert!(payload["products"].is_array());
        assert_eq!(payload["requirements"]["reason"], "ski trip");
        assert_eq!(payload["requirements"]["is_complete"], true);
        assert_eq!(payload["sources"].as_array().map(Vec::len), Some(4));
    });
}

#[test]
fn search_rejects_a_brief_that_is_not_an_object() {
    with_env(&[], || {
        let result = search::run(LoadOptions::default(), "[\"ski\"]");
        assert_eq!(result.exit_code, 4, "expected input failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "search");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_brief");
    });
}

#[test]
fn doctor_json_passes_with_defaults() {
    with_env(&[], || {
        let result = doctor::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 0, "expected doctor pass: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(3));
        assert_eq!(payload["checks"][1]["name"], "extractor_readiness");
        assert_eq!(payload["checks"][1]["details"], "rule-based extractor needs no credentials");
    });
}

#[test]
fn doctor_json_fails_and_skips_when_config_invalid() {
    with_env(&[("SHOPWISE_LLM_PROVIDER", "openai")], || {
        let result = doctor::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 3, "expected doctor failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_lists_each_check() {
    with_env(&[], || {
        let result = doctor::run(LoadOptions::default(), false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] source_registry: 4 sources registered"));
    });
}

#[test]
fn config_attributes_env_values_and_redacts_secrets() {
    with_env(
        &[
            ("SHOPWISE_SERVER_PORT", "9191"),
            ("SHOPWISE_LLM_PROVIDER", "openai"),
            ("SHOPWISE_LLM_API_KEY", "sk-live-secret"),
        ],
        || {
            let result = config::run(LoadOptions::default());
            assert_eq!(result.exit_code, 0, "expected config render: {}", result.output);
            assert!(result
                .output
                .contains("- server.port = 9191 (source: env (SHOPWISE_SERVER_PORT))"));
            assert!(result.output.contains("- llm.api_key = sk-*** (source: env"));
            assert!(!result.output.contains("sk-live-secret"));
            assert!(result.output.contains("- completion.max_turns = 3 (source: default)"));
        },
    );
}

#[test]
fn config_attributes_values_from_an_explicit_file() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("shopwise.toml");
        fs::write(&path, "[llm]\nmodel = \"file-model\"\n").expect("write config");

        let options = LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..Default::default()
        };
        let result = config::run(options);
        assert_eq!(result.exit_code, 0, "expected config render: {}", result.output);

        let expected = format!("- llm.model = file-model (source: file ({}))", path.display());
        assert!(result.output.contains(&expected), "missing `{expected}` in {}", result.output);
    });
}

#[test]
fn config_fails_when_an_explicit_file_is_missing() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("temp dir");
        let options = LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..Default::default()
        };
        let result = config::run(options);
        assert_eq!(result.exit_code, 2, "expected config failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHOPWISE_LLM_PROVIDER",
        "SHOPWISE_LLM_API_KEY",
        "SHOPWISE_LLM_BASE_URL",
        "SHOPWISE_LLM_MODEL",
        "SHOPWISE_LLM_TIMEOUT_SECS",
        "SHOPWISE_SERVER_BIND_ADDRESS",
        "SHOPWISE_SERVER_PORT",
        "SHOPWISE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SHOPWISE_SEARCH_SOURCE_TIMEOUT_MS",
        "SHOPWISE_SEARCH_LIMIT_PER_SOURCE",
        "SHOPWISE_SEARCH_DEMO_CATALOG",
        "SHOPWISE_RANKING_COST",
        "SHOPWISE_RANKING_DELIVERY",
        "SHOPWISE_RANKING_PREFERENCE",
        "SHOPWISE_RANKING_COHERENCE",
        "SHOPWISE_COMPLETION_MAX_TURNS",
        "SHOPWISE_COMPLETION_SUFFICIENCY_THRESHOLD",
        "SHOPWISE_LOGGING_LEVEL",
        "SHOPWISE_LOGGING_FORMAT",
        "SHOPWISE_LOG_LEVEL",
        "SHOPWISE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
