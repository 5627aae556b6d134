//! Incident persistence seam.
//!
//! The engine only ever talks to an [`IncidentStore`]. Two implementations ship with the
//! crate: [`MemoryStore`] for tests and embedding, [`SqliteStore`] for the CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::domain::{Incident, IncidentCategory, IncidentPriority, IncidentStatus};
use crate::error::AppError;
use crate::predicate::Predicate;
use crate::sort::SortSpec;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Total,
    Status,
    Category,
    /// UTC creation day paired with status; drives the daily series.
    DayAndStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupKey {
    Total,
    Status(IncidentStatus),
    Category(IncidentCategory),
    DayAndStatus(Date, IncidentStatus),
}

impl GroupKey {
    pub fn for_incident(group_by: GroupBy, incident: &Incident) -> Self {
        match group_by {
            GroupBy::Total => Self::Total,
            GroupBy::Status => Self::Status(incident.status),
            GroupBy::Category => Self::Category(incident.category),
            GroupBy::DayAndStatus => Self::DayAndStatus(incident.created_day(), incident.status),
        }
    }
}

/// A fully-formed incident row that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentDraft {
    pub title: String,
    pub description: String,
    pub category: IncidentCategory,
    pub status: IncidentStatus,
    pub priority: IncidentPriority,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub reporter_id: i64,
    pub resolver_id: Option<i64>,
}

impl IncidentDraft {
    pub fn into_incident(self, id: i64) -> Incident {
        Incident {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            status: self.status,
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
            reporter_id: self.reporter_id,
            resolver_id: self.resolver_id,
        }
    }
}

/// Outcome of a status decision, applied by the store together with `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: IncidentStatus,
    pub resolver_id: Option<i64>,
}

/// Decides the new status of an incident given its current row. Runs inside the
/// store's write critical section.
pub type StatusDecision<'a> = &'a dyn Fn(&Incident) -> Result<StatusChange, AppError>;

pub trait IncidentStore: Send + Sync {
    /// Rows matching `predicate`, ordered by `sort` with ascending id as tie-break,
    /// then windowed by `offset`/`limit`.
    fn query_incidents(
        &self,
        predicate: &Predicate,
        sort: &SortSpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Incident>, AppError>;

    /// Counts of matching rows per group. Groups with no rows are absent.
    fn count_incidents(
        &self,
        predicate: &Predicate,
        group_by: GroupBy,
    ) -> Result<BTreeMap<GroupKey, i64>, AppError>;

    fn count(&self, predicate: &Predicate) -> Result<i64, AppError> {
        Ok(self
            .count_incidents(predicate, GroupBy::Total)?
            .get(&GroupKey::Total)
            .copied()
            .unwrap_or(0))
    }

    fn get_incident(&self, id: i64) -> Result<Option<Incident>, AppError>;

    fn insert_incident(&self, draft: IncidentDraft) -> Result<Incident, AppError>;

    /// Atomic read-modify-write of one incident's status. `decide` sees the current row
    /// and either rejects (its error is returned untouched, nothing is written) or
    /// returns the change to persist with `updated_at = now`.
    ///
    /// Missing incidents yield `NOT_FOUND`.
    fn update_status(
        &self,
        id: i64,
        now: OffsetDateTime,
        decide: StatusDecision<'_>,
    ) -> Result<Incident, AppError>;

    /// Returns whether a row was removed.
    fn delete_incident(&self, id: i64) -> Result<bool, AppError>;
}
