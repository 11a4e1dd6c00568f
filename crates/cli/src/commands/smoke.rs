use std::time::Instant;

use serde::Serialize;
use shopwise_agent::runtime::AgentRuntime;
use shopwise_agent::sessions::ShoppingSession;
use shopwise_core::config::{AppConfig, LoadOptions};
use shopwise_core::domain::requirement::SessionId;
use shopwise_core::errors::ApplicationError;
use shopwise_core::flows::SessionStatus;

use crate::commands::{escape_json, CommandResult, EXIT_SMOKE};

/// Scripted user turns, sent until the brief is ready.
const SCRIPT: [&str; 3] =
    ["I need a ski outfit", "max 400€ and I need it in 5 days", "that's all, search now"];

const CORRELATION_ID: &str = "smoke";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(options)) {
        Ok((elapsed_ms, config)) => {
            checks.push(passed(
                "config_validation",
                elapsed_ms,
                "configuration loaded and validated",
            ));
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(failed("config_validation", elapsed_ms, error.to_string()));
            skip_rest(&mut checks, &["runtime_init", "conversation", "search", "cart"]);
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let agent = match timed_check(|| AgentRuntime::from_config(&config)) {
        Ok((elapsed_ms, agent)) => {
            let message = format!(
                "{} extractor over sources [{}]",
                agent.extractor_name(),
                agent.source_ids().join(", ")
            );
            checks.push(passed("runtime_init", elapsed_ms, message));
            agent
        }
        Err((elapsed_ms, error)) => {
            checks.push(failed("runtime_init", elapsed_ms, format!("{error:#}")));
            skip_rest(&mut checks, &["conversation", "search", "cart"]);
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(failed(
                "conversation",
                0,
                format!("failed to initialize async runtime: {error}"),
            ));
            skip_rest(&mut checks, &["search", "cart"]);
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let mut session = ShoppingSession::new(SessionId::generate());

    let conversation_started = Instant::now();
    let conversation = runtime.block_on(async {
        for message in SCRIPT {
            agent.handle_turn(&mut session, message, CORRELATION_ID).await?;
            if session.status() == SessionStatus::ReadyForSearch {
                break;
            }
        }
        Ok::<_, ApplicationError>(())
    });
    let conversation_ms = elapsed_since(conversation_started);

    match conversation {
        Ok(()) if session.status() == SessionStatus::ReadyForSearch => {
            checks.push(passed(
                "conversation",
                conversation_ms,
                format!("brief ready after {} turns", session.turns()),
            ));
        }
        Ok(()) => {
            checks.push(failed(
                "conversation",
                conversation_ms,
                format!(
                    "brief still {} after {} scripted turns",
                    session.status().as_str(),
                    session.turns()
                ),
            ));
            skip_rest(&mut checks, &["search", "cart"]);
            return finalize_report(checks, elapsed_since(started));
        }
        Err(error) => {
            checks.push(failed("conversation", conversation_ms, error.to_string()));
            skip_rest(&mut checks, &["search", "cart"]);
            return finalize_report(checks, elapsed_since(started));
        }
    }

    let search_started = Instant::now();
    let search = runtime.block_on(agent.run_search(&mut session, CORRELATION_ID));
    let search_ms = elapsed_since(search_started);

    let top = match search {
        Ok(result) => match result.products.first() {
            Some(top) => {
                checks.push(passed(
                    "search",
                    search_ms,
                    format!(
                        "{} products ranked from {} sources",
                        result.products.len(),
                        result.sources.len()
                    ),
                ));
                top.candidate.clone()
            }
            None => {
                checks.push(failed("search", search_ms, "search returned no products"));
                skip_rest(&mut checks, &["cart"]);
                return finalize_report(checks, elapsed_since(started));
            }
        },
        Err(error) => {
            checks.push(failed("search", search_ms, error.to_string()));
            skip_rest(&mut checks, &["cart"]);
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let cart = timed_check(|| {
        agent.add_to_cart(
            &mut session,
            top.source_id(),
            top.external_id(),
            1,
            None,
            CORRELATION_ID,
        )
    });
    match cart {
        Ok((elapsed_ms, id)) => {
            let summary = session.cart().summary();
            checks.push(passed(
                "cart",
                elapsed_ms,
                format!(
                    "added `{}` as item {id}, total {} {}",
                    top.title(),
                    summary.total_price,
                    summary.currency
                ),
            ));
        }
        Err((elapsed_ms, error)) => checks.push(failed("cart", elapsed_ms, error.to_string())),
    }

    finalize_report(checks, elapsed_since(started))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn passed(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message: message.into() }
}

fn failed(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message: message.into() }
}

fn skip_rest(checks: &mut Vec<SmokeCheck>, names: &[&'static str]) {
    checks.extend(names.iter().map(|&name| SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }));
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult {
        exit_code: if failed { EXIT_SMOKE } else { 0 },
        output: format!("{human}\n{machine}"),
    }
}
