use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{FlowAction, FlowContext, FlowEvent, SessionStatus, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> SessionStatus;
    fn transition(
        &self,
        current: &SessionStatus,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct ShoppingSessionFlow;

impl FlowDefinition for ShoppingSessionFlow {
    fn initial_state(&self) -> SessionStatus {
        SessionStatus::GatheringInfo
    }

    fn transition(
        &self,
        current: &SessionStatus,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_session(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> SessionStatus {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &SessionStatus,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &SessionStatus,
        event: &FlowEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    audit
                        .event(
                            "session.transition_applied",
                            AuditCategory::Session,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", outcome.from.as_str())
                        .with_metadata("to", outcome.to.as_str())
                        .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event(
                            "session.transition_rejected",
                            AuditCategory::Session,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("from", current.as_str())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<ShoppingSessionFlow> {
    fn default() -> Self {
        Self::new(ShoppingSessionFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("requirements are not complete in state {state:?}")]
    RequirementsIncomplete { state: SessionStatus },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: SessionStatus, event: FlowEvent },
}

fn transition_session(
    current: &SessionStatus,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{FreezeRequirements, PresentResults, QuerySources, RankCandidates};
    use FlowEvent::{RequirementsCompleted, ResultsRanked, SearchAborted, SearchStarted};
    use SessionStatus::{GatheringInfo, ReadyForSearch, ResultsReady, Searching};

    let (to, actions) = match (current, event) {
        (GatheringInfo, RequirementsCompleted) => {
            if !context.requirements_complete {
                return Err(FlowTransitionError::RequirementsIncomplete { state: *current });
            }
            (ReadyForSearch, vec![FreezeRequirements])
        }
        (ReadyForSearch, SearchStarted) | (ResultsReady, SearchStarted) => {
            (Searching, vec![QuerySources, RankCandidates])
        }
        (Searching, ResultsRanked) => (ResultsReady, vec![PresentResults]),
        (Searching, SearchAborted) => (ReadyForSearch, Vec::new()),
        _ => {
            return Err(FlowTransitionError::InvalidTransition { state: *current, event: *event });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}
