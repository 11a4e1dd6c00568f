use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use shopwise_agent::runtime::AgentRuntime;

use crate::routes::ApiState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub extractor: HealthCheck,
    pub sources: HealthCheck,
    pub checked_at: String,
}

pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let sources = sources_check(&state.runtime);
    let ready = sources.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("{} active sessions", state.sessions.len().await),
        },
        extractor: HealthCheck {
            status: "ready",
            detail: format!("{} extractor configured", state.runtime.extractor_name()),
        },
        sources,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn sources_check(runtime: &Arc<AgentRuntime>) -> HealthCheck {
    let ids = runtime.source_ids();
    if ids.is_empty() {
        HealthCheck { status: "degraded", detail: "no product sources registered".to_string() }
    } else {
        HealthCheck { status: "ready", detail: ids.join(",") }
    }
}
