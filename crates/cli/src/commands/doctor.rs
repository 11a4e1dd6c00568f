use serde::Serialize;
use shopwise_agent::runtime::{build_extractor, build_sources};
use shopwise_core::config::{AppConfig, LlmProvider, LoadOptions};

use crate::commands::{escape_json, CommandResult, EXIT_DOCTOR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_DOCTOR };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_extractor(&config));
            checks.push(check_sources(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "extractor_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "source_registry",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_extractor(config: &AppConfig) -> DoctorCheck {
    match build_extractor(&config.llm) {
        Ok(extractor) => {
            let details = match config.llm.provider {
                LlmProvider::Rules => "rule-based extractor needs no credentials".to_string(),
                provider => format!(
                    "{} extractor using {} model `{}`",
                    extractor.name(),
                    provider.as_str(),
                    config.llm.model
                ),
            };
            DoctorCheck { name: "extractor_readiness", status: CheckStatus::Pass, details }
        }
        Err(error) => DoctorCheck {
            name: "extractor_readiness",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn check_sources(config: &AppConfig) -> DoctorCheck {
    match build_sources(&config.search) {
        Ok(sources) if sources.is_empty() => DoctorCheck {
            name: "source_registry",
            status: CheckStatus::Fail,
            details: "no product sources registered".to_string(),
        },
        Ok(sources) => {
            let ids = sources.iter().map(|source| source.id()).collect::<Vec<_>>();
            DoctorCheck {
                name: "source_registry",
                status: CheckStatus::Pass,
                details: format!(
                    "{} sources registered ({}), timeout {}ms",
                    ids.len(),
                    ids.join(", "),
                    config.search.source_timeout_ms
                ),
            }
        }
        Err(error) => DoctorCheck {
            name: "source_registry",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
