use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::requirement::RequirementSpec;
use crate::domain::update::{FieldName, UpdateEvent};

pub const DEFAULT_MAX_TURNS: u32 = 3;
pub const DEFAULT_SUFFICIENCY_THRESHOLD: u32 = 3;
pub const MAX_QUESTION_CHARS: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatheringState {
    Gathering,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    ExplicitSignal,
    TurnLimit,
    Sufficient,
}

/// Inputs observed for one conversational turn.
#[derive(Clone, Copy, Debug)]
pub struct TurnInput<'a> {
    pub event: &'a UpdateEvent,
    pub explicit_complete: bool,
    /// Turns processed so far, including this one.
    pub turn: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub from: GatheringState,
    pub to: GatheringState,
    pub reason: Option<CompletionReason>,
}

impl CompletionOutcome {
    pub fn became_ready(&self) -> bool {
        self.from == GatheringState::Gathering && self.to == GatheringState::Ready
    }
}

/// Weighted set of fields that must be filled before searching makes sense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SufficiencyRule {
    pub weights: BTreeMap<FieldName, u32>,
    pub threshold: u32,
}

impl SufficiencyRule {
    pub fn filled_weight(&self, spec: &RequirementSpec) -> u32 {
        self.weights
            .iter()
            .filter(|(field, _)| is_filled(spec, **field))
            .map(|(_, weight)| *weight)
            .sum()
    }

    pub fn is_satisfied(&self, spec: &RequirementSpec) -> bool {
        self.filled_weight(spec) >= self.threshold
    }
}

impl Default for SufficiencyRule {
    fn default() -> Self {
        let weights = [
            FieldName::BudgetMin,
            FieldName::BudgetMax,
            FieldName::DeliveryDeadline,
            FieldName::EventType,
            FieldName::Reason,
            FieldName::PeopleCount,
            FieldName::Preferences,
            FieldName::MustHaves,
            FieldName::NiceToHaves,
        ]
        .into_iter()
        .map(|field| (field, 1))
        .collect();

        Self { weights, threshold: DEFAULT_SUFFICIENCY_THRESHOLD }
    }
}

/// Decides when gathering stops. Ready is terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionPolicy {
    pub max_turns: u32,
    pub sufficiency: SufficiencyRule,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self { max_turns: DEFAULT_MAX_TURNS, sufficiency: SufficiencyRule::default() }
    }
}

impl CompletionPolicy {
    pub fn new(max_turns: u32, sufficiency: SufficiencyRule) -> Self {
        Self { max_turns, sufficiency }
    }

    /// `spec` is the brief after `input.event` has been applied.
    pub fn transition(
        &self,
        current: GatheringState,
        input: TurnInput<'_>,
        spec: &RequirementSpec,
    ) -> CompletionOutcome {
        if current == GatheringState::Ready {
            return CompletionOutcome { from: current, to: current, reason: None };
        }

        let reason = if input.explicit_complete {
            Some(CompletionReason::ExplicitSignal)
        } else if input.turn >= self.max_turns {
            Some(CompletionReason::TurnLimit)
        } else if self.sufficiency.is_satisfied(spec) {
            Some(CompletionReason::Sufficient)
        } else {
            None
        };

        let to = if reason.is_some() { GatheringState::Ready } else { GatheringState::Gathering };
        CompletionOutcome { from: current, to, reason }
    }

    /// Follow-up question for the first missing field, or `None` when nothing
    /// worth asking about is missing.
    pub fn clarifying_question(&self, spec: &RequirementSpec) -> Option<&'static str> {
        if spec.reason().is_none() && spec.event_type().is_none() {
            return Some("What's the occasion?");
        }
        if spec.budget_max().is_none() && spec.budget_min().is_none() {
            return Some("What's your budget?");
        }
        if spec.delivery_deadline().is_none() {
            return Some("When do you need it by?");
        }
        if spec.preferences().is_empty() {
            return Some("Any size, colour or style wishes?");
        }
        None
    }
}

pub fn is_filled(spec: &RequirementSpec, field: FieldName) -> bool {
    match field {
        FieldName::BudgetMin => spec.budget_min().is_some(),
        FieldName::BudgetMax => spec.budget_max().is_some(),
        FieldName::BudgetCurrency => spec.budget_currency().is_some(),
        FieldName::DeliveryDeadline => spec.delivery_deadline().is_some(),
        FieldName::Category => spec.category().is_some(),
        FieldName::Country => spec.country().is_some(),
        FieldName::City => spec.city().is_some(),
        FieldName::EventType => spec.event_type().is_some(),
        FieldName::EventName => spec.event_name().is_some(),
        FieldName::PeopleCount => spec.people_count().is_some(),
        FieldName::Reason => spec.reason().is_some(),
        FieldName::Preferences => !spec.preferences().is_empty(),
        FieldName::MustHaves => !spec.must_haves().is_empty(),
        FieldName::NiceToHaves => !spec.nice_to_haves().is_empty(),
    }
}
