//! Incident creation, status transitions, lookup and deletion under the role policy.

use time::OffsetDateTime;

use crate::config::TransitionMode;
use crate::domain::{Actor, Incident, IncidentStatus, NewIncident};
use crate::error::{AppError, INVALID_TRANSITION};
use crate::policy::can_view;
use crate::store::{IncidentDraft, IncidentStore, StatusChange};

/// Any actor may report; the reporter is always the actor itself.
pub fn create_incident(
    store: &dyn IncidentStore,
    actor: &Actor,
    new: NewIncident,
    now: OffsetDateTime,
) -> Result<Incident, AppError> {
    new.validate()?;
    store.insert_incident(IncidentDraft {
        title: new.title.trim().to_string(),
        description: new.description,
        category: new.category,
        status: IncidentStatus::Open,
        priority: new.priority,
        created_at: now,
        updated_at: now,
        reporter_id: actor.id,
        resolver_id: None,
    })
}

pub fn check_transition(
    from: IncidentStatus,
    to: IncidentStatus,
    mode: TransitionMode,
) -> Result<(), AppError> {
    if mode == TransitionMode::Permissive {
        return Ok(());
    }
    let allowed = matches!(
        (from, to),
        (IncidentStatus::Open, IncidentStatus::InProgress)
            | (IncidentStatus::InProgress, IncidentStatus::Solved)
    );
    if allowed {
        Ok(())
    } else {
        Err(AppError::new(
            INVALID_TRANSITION,
            format!("Cannot move incident from {from} to {to}"),
        )
        .with_details(format!("from={from}; to={to}")))
    }
}

/// Admin-only status change. The visibility and transition checks run inside the store's
/// critical section against the current row, so concurrent resolvers serialize.
pub fn transition_status(
    store: &dyn IncidentStore,
    actor: &Actor,
    id: i64,
    target: IncidentStatus,
    now: OffsetDateTime,
    mode: TransitionMode,
) -> Result<Incident, AppError> {
    if !actor.role.is_admin() {
        return Err(AppError::forbidden("Only admins may change incident status")
            .with_details(format!("role={}", actor.role)));
    }

    store.update_status(id, now, &|current: &Incident| {
        if !can_view(actor, current) {
            return Err(AppError::not_found(id));
        }
        check_transition(current.status, target, mode)?;
        let resolver_id = match (target, current.resolver_id) {
            (IncidentStatus::Solved, None) => Some(actor.id),
            (_, existing) => existing,
        };
        Ok(StatusChange {
            status: target,
            resolver_id,
        })
    })
}

/// Visible incidents only; anything else is indistinguishable from a missing id.
pub fn get_incident(store: &dyn IncidentStore, actor: &Actor, id: i64) -> Result<Incident, AppError> {
    match store.get_incident(id)? {
        Some(incident) if can_view(actor, &incident) => Ok(incident),
        _ => Err(AppError::not_found(id)),
    }
}

pub fn delete_incident(store: &dyn IncidentStore, actor: &Actor, id: i64) -> Result<(), AppError> {
    if !actor.role.is_admin() {
        return Err(AppError::forbidden("Only admins may delete incidents")
            .with_details(format!("role={}", actor.role)));
    }
    get_incident(store, actor, id)?;
    if store.delete_incident(id)? {
        Ok(())
    } else {
        Err(AppError::not_found(id))
    }
}
