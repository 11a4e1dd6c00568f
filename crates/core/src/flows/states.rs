use serde::{Deserialize, Serialize};

/// Lifecycle of a shopping session as exposed to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    GatheringInfo,
    ReadyForSearch,
    Searching,
    ResultsReady,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GatheringInfo => "gathering_info",
            Self::ReadyForSearch => "ready_for_search",
            Self::Searching => "searching",
            Self::ResultsReady => "results_ready",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    RequirementsCompleted,
    SearchStarted,
    ResultsRanked,
    SearchAborted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub requirements_complete: bool,
}

impl FlowContext {
    pub fn completed() -> Self {
        Self { requirements_complete: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    FreezeRequirements,
    QuerySources,
    RankCandidates,
    PresentResults,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: SessionStatus,
    pub to: SessionStatus,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
