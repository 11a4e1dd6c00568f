use serde::Serialize;

use crate::domain::requirement::{OrderedSet, RequirementSpec};
use crate::domain::update::{FieldName, FieldUpdate, UpdateEvent};

/// What a single [`IntentUpdateApplier::apply`] call did to the brief.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub changed: Vec<FieldName>,
    pub ignored_frozen: bool,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Merges update events into a [`RequirementSpec`].
///
/// Scalars are last-write-wins, collections are append-only unions with exact
/// string dedup, and a complete brief ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntentUpdateApplier;

impl IntentUpdateApplier {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, spec: &mut RequirementSpec, event: &UpdateEvent) -> ApplyReport {
        for rejection in event.rejections() {
            tracing::debug!(
                event_name = "requirements.field_rejected",
                field = %rejection.field,
                reason = ?rejection.reason,
                detail = %rejection.detail,
                "dropped field from update event"
            );
        }

        if spec.is_complete() {
            if !event.is_empty() {
                tracing::debug!(
                    event_name = "requirements.update_ignored",
                    fields = event.updates().len(),
                    "requirements are frozen; ignoring update event"
                );
            }
            return ApplyReport { changed: Vec::new(), ignored_frozen: !event.is_empty() };
        }

        let mut report = ApplyReport::default();
        for update in event.updates() {
            if apply_one(spec, update) && !report.changed.contains(&update.field()) {
                report.changed.push(update.field());
            }
        }

        tracing::debug!(
            event_name = "requirements.update_applied",
            changed = ?report.changed,
            "applied update event"
        );
        report
    }

    /// Pure form of [`IntentUpdateApplier::apply`].
    pub fn applied(&self, spec: &RequirementSpec, event: &UpdateEvent) -> RequirementSpec {
        let mut next = spec.clone();
        self.apply(&mut next, event);
        next
    }
}

fn apply_one(spec: &mut RequirementSpec, update: &FieldUpdate) -> bool {
    match update {
        FieldUpdate::BudgetMin(value) => overwrite(&mut spec.budget_min, *value),
        FieldUpdate::BudgetMax(value) => overwrite(&mut spec.budget_max, *value),
        FieldUpdate::BudgetCurrency(value) => overwrite(&mut spec.budget_currency, value.clone()),
        FieldUpdate::DeliveryDeadline(value) => overwrite(&mut spec.delivery_deadline, *value),
        FieldUpdate::Category(value) => overwrite(&mut spec.category, value.clone()),
        FieldUpdate::Country(value) => overwrite(&mut spec.country, value.clone()),
        FieldUpdate::City(value) => overwrite(&mut spec.city, value.clone()),
        FieldUpdate::EventType(value) => overwrite(&mut spec.event_type, value.clone()),
        FieldUpdate::EventName(value) => overwrite(&mut spec.event_name, value.clone()),
        FieldUpdate::PeopleCount(value) => overwrite(&mut spec.people_count, *value),
        FieldUpdate::Reason(value) => overwrite(&mut spec.reason, value.clone()),
        FieldUpdate::Preferences(items) => union(&mut spec.preferences, items),
        FieldUpdate::MustHaves(items) => union(&mut spec.must_haves, items),
        FieldUpdate::NiceToHaves(items) => union(&mut spec.nice_to_haves, items),
    }
}

fn overwrite<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    let changed = slot.as_ref() != Some(&value);
    *slot = Some(value);
    changed
}

fn union(set: &mut OrderedSet, items: &[String]) -> bool {
    items.iter().fold(false, |changed, item| set.insert(item.clone()) || changed)
}
