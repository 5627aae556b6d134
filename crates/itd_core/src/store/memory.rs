use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::OffsetDateTime;

use super::{GroupBy, GroupKey, IncidentDraft, IncidentStore, StatusDecision};
use crate::domain::Incident;
use crate::error::{AppError, STORE_LOCK_POISONED};
use crate::predicate::Predicate;
use crate::sort::SortSpec;

#[derive(Debug, Default)]
struct MemoryState {
    /// Kept in ascending id order.
    rows: Vec<Incident>,
    next_id: i64,
}

/// In-process store. Predicates are evaluated with [`Predicate::matches`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with pre-built rows (ids are kept as given).
    pub fn with_incidents(incidents: impl IntoIterator<Item = Incident>) -> Self {
        let mut rows: Vec<Incident> = incidents.into_iter().collect();
        rows.sort_by_key(|r| r.id);
        let next_id = rows.last().map(|r| r.id).unwrap_or(0);
        Self {
            state: RwLock::new(MemoryState { rows, next_id }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, AppError> {
        self.state.read().map_err(|e| {
            AppError::new(STORE_LOCK_POISONED, "Incident store lock poisoned")
                .with_details(e.to_string())
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, AppError> {
        self.state.write().map_err(|e| {
            AppError::new(STORE_LOCK_POISONED, "Incident store lock poisoned")
                .with_details(e.to_string())
        })
    }
}

impl IncidentStore for MemoryStore {
    fn query_incidents(
        &self,
        predicate: &Predicate,
        sort: &SortSpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Incident>, AppError> {
        let state = self.read()?;
        let mut matched: Vec<Incident> = state
            .rows
            .iter()
            .filter(|r| predicate.matches(r))
            .cloned()
            .collect();
        drop(state);

        sort.sort(&mut matched);
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(skip).take(take).collect())
    }

    fn count_incidents(
        &self,
        predicate: &Predicate,
        group_by: GroupBy,
    ) -> Result<BTreeMap<GroupKey, i64>, AppError> {
        let state = self.read()?;
        let mut out = BTreeMap::new();
        for row in state.rows.iter().filter(|r| predicate.matches(r)) {
            *out.entry(GroupKey::for_incident(group_by, row)).or_insert(0) += 1;
        }
        Ok(out)
    }

    fn get_incident(&self, id: i64) -> Result<Option<Incident>, AppError> {
        let state = self.read()?;
        Ok(state.rows.iter().find(|r| r.id == id).cloned())
    }

    fn insert_incident(&self, draft: IncidentDraft) -> Result<Incident, AppError> {
        let mut state = self.write()?;
        state.next_id += 1;
        let incident = draft.into_incident(state.next_id);
        state.rows.push(incident.clone());
        Ok(incident)
    }

    fn update_status(
        &self,
        id: i64,
        now: OffsetDateTime,
        decide: StatusDecision<'_>,
    ) -> Result<Incident, AppError> {
        let mut state = self.write()?;
        let row = state
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found(id))?;

        let change = decide(row)?;
        row.status = change.status;
        row.resolver_id = change.resolver_id;
        row.updated_at = now;
        Ok(row.clone())
    }

    fn delete_incident(&self, id: i64) -> Result<bool, AppError> {
        let mut state = self.write()?;
        let before = state.rows.len();
        state.rows.retain(|r| r.id != id);
        Ok(state.rows.len() != before)
    }
}
