use std::sync::Arc;

use shopwise_agent::{runtime::AgentRuntime, sessions::SessionRegistry};
use shopwise_core::config::AppConfig;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
    pub sessions: Arc<SessionRegistry>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("agent runtime setup failed: {0:#}")]
    Runtime(anyhow::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        "starting application bootstrap"
    );
    let runtime = AgentRuntime::from_config(&config).map_err(BootstrapError::Runtime)?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        extractor = runtime.extractor_name(),
        sources = %runtime.source_ids().join(","),
        "agent runtime initialized"
    );

    Ok(Application {
        config,
        runtime: Arc::new(runtime),
        sessions: Arc::new(SessionRegistry::new()),
    })
}
