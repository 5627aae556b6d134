//! Query observation hooks.
//!
//! The engine reports what it did through an injected [`QueryObserver`]; it never installs
//! a subscriber itself. [`TracingObserver`] forwards to `tracing`.

use std::time::Duration;

use serde::Serialize;

use crate::domain::Role;
use crate::filter::DateStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Search,
    Stats,
    Get,
    Create,
    TransitionStatus,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Search => "search",
            Self::Stats => "stats",
            Self::Get => "get",
            Self::Create => "create",
            Self::TransitionStatus => "transition_status",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub operation: Operation,
    pub actor_id: i64,
    pub role: Role,
    pub returned: usize,
    /// Total matches before paging; absent for operations that do not count.
    pub total: Option<u64>,
    pub date_stage: Option<DateStage>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEvent {
    pub operation: Operation,
    pub actor_id: i64,
    pub role: Role,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub operation: Operation,
    pub actor_id: i64,
    pub role: Role,
    pub incident_id: i64,
}

pub trait QueryObserver: Send + Sync {
    fn on_query(&self, event: &QueryEvent);

    fn on_rejected(&self, event: &RejectedEvent);

    fn on_mutation(&self, _event: &MutationEvent) {}
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QueryObserver for TracingObserver {
    fn on_query(&self, event: &QueryEvent) {
        tracing::info!(
            target: "itd_core::query",
            operation = event.operation.as_str(),
            actor_id = event.actor_id,
            role = event.role.as_str(),
            returned = event.returned,
            total = event.total,
            date_stage = ?event.date_stage,
            elapsed_ms = elapsed_millis(event.elapsed),
            "query completed"
        );
    }

    fn on_rejected(&self, event: &RejectedEvent) {
        tracing::warn!(
            target: "itd_core::query",
            operation = event.operation.as_str(),
            actor_id = event.actor_id,
            role = event.role.as_str(),
            code = %event.code,
            message = %event.message,
            "request rejected"
        );
    }

    fn on_mutation(&self, event: &MutationEvent) {
        tracing::info!(
            target: "itd_core::query",
            operation = event.operation.as_str(),
            actor_id = event.actor_id,
            role = event.role.as_str(),
            incident_id = event.incident_id,
            "incident changed"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl QueryObserver for NoopObserver {
    fn on_query(&self, _event: &QueryEvent) {}

    fn on_rejected(&self, _event: &RejectedEvent) {}
}
