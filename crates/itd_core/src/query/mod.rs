//! Role-aware query orchestration.
//!
//! Every request is composed the same way: the actor's visibility predicate first, then the
//! request's own constraints on top. Parameters are validated before the store is touched.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::EngineConfig;
use crate::domain::{Actor, Incident, IncidentStatus, NewIncident};
use crate::error::AppError;
use crate::filter::{self, DateStage, ListFilters};
use crate::lifecycle;
use crate::observe::{
    MutationEvent, Operation, QueryEvent, QueryObserver, RejectedEvent, TracingObserver,
};
use crate::pager::{self, PaginationMeta};
use crate::policy::visible_predicate;
use crate::predicate::Predicate;
use crate::sort::SortSpec;
use crate::stats::{self, StatsPayload, StatsWindow};
use crate::store::IncidentStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(flatten)]
    pub filters: ListFilters,
    #[serde(default, alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(default, alias = "sortOrder")]
    pub sort_order: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default, alias = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentPage {
    pub items: Vec<Incident>,
    pub pagination: PaginationMeta,
    pub sort: SortSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_stage: Option<DateStage>,
}

/// Entry point for every read and write against the incident store.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn IncidentStore>,
    observer: Arc<dyn QueryObserver>,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(store: impl IncidentStore + 'static) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<dyn IncidentStore>) -> Self {
        Self {
            store,
            observer: Arc::new(TracingObserver),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &dyn IncidentStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn list(&self, actor: &Actor, params: &ListParams) -> Result<IncidentPage, AppError> {
        let started = Instant::now();
        let result = self.list_inner(actor, params);
        match &result {
            Ok(page) => self.observer.on_query(&QueryEvent {
                operation: Operation::List,
                actor_id: actor.id,
                role: actor.role,
                returned: page.items.len(),
                total: Some(page.pagination.total_count),
                date_stage: page.date_stage,
                elapsed: started.elapsed(),
            }),
            Err(err) => self.rejected(Operation::List, actor, err),
        }
        result
    }

    fn list_inner(&self, actor: &Actor, params: &ListParams) -> Result<IncidentPage, AppError> {
        let visible = visible_predicate(actor);
        let compiled = filter::compile(&params.filters)?;
        let sort = SortSpec::resolve(params.sort_by.as_deref(), params.sort_order.as_deref());
        let window = pager::paginate(
            params.page.unwrap_or(1),
            params
                .page_size
                .unwrap_or_else(|| i64::from(self.config.default_page_size)),
            self.config.max_page_size,
        )?;

        let base = visible.and(compiled.constraints);
        let (predicate, date_stage) =
            filter::apply_date_strategy(base, compiled.date, |candidate| {
                self.store.count(candidate)
            })?;

        let total = self.store.count(&predicate)?;
        let items = self
            .store
            .query_incidents(&predicate, &sort, window.offset, window.limit)?;

        Ok(IncidentPage {
            items,
            pagination: PaginationMeta::new(&window, u64::try_from(total).unwrap_or(0)),
            sort,
            date_stage,
        })
    }

    /// Free-text search over title and description, newest first, within the actor's
    /// visibility.
    pub fn search(&self, actor: &Actor, params: &SearchParams) -> Result<Vec<Incident>, AppError> {
        let started = Instant::now();
        let result = self.search_inner(actor, params);
        match &result {
            Ok(items) => self.observer.on_query(&QueryEvent {
                operation: Operation::Search,
                actor_id: actor.id,
                role: actor.role,
                returned: items.len(),
                total: None,
                date_stage: None,
                elapsed: started.elapsed(),
            }),
            Err(err) => self.rejected(Operation::Search, actor, err),
        }
        result
    }

    fn search_inner(&self, actor: &Actor, params: &SearchParams) -> Result<Vec<Incident>, AppError> {
        let q = params.q.trim();
        if q.is_empty() {
            return Err(AppError::invalid_parameter("q", &params.q, "q must not be blank"));
        }

        let skip = params.skip.unwrap_or(0);
        let offset = u64::try_from(skip)
            .map_err(|_| AppError::invalid_parameter("skip", &skip.to_string(), "skip must be >= 0"))?;

        let max = self.config.max_page_size;
        let limit = params
            .limit
            .unwrap_or_else(|| i64::from(self.config.search_default_limit));
        let limit = u64::try_from(limit)
            .ok()
            .filter(|l| (1..=u64::from(max)).contains(l))
            .ok_or_else(|| {
                AppError::invalid_parameter(
                    "limit",
                    &limit.to_string(),
                    format!("limit must be between 1 and {max}"),
                )
            })?;

        let predicate = visible_predicate(actor).and(Predicate::text_contains(q));
        self.store
            .query_incidents(&predicate, &SortSpec::newest_first(), offset, limit)
    }

    pub fn stats(
        &self,
        actor: &Actor,
        window: StatsWindow,
        now: OffsetDateTime,
    ) -> Result<StatsPayload, AppError> {
        let started = Instant::now();
        let result = stats::compute(self.store.as_ref(), actor, window, now);
        match &result {
            Ok(_) => self.observer.on_query(&QueryEvent {
                operation: Operation::Stats,
                actor_id: actor.id,
                role: actor.role,
                returned: 1,
                total: None,
                date_stage: None,
                elapsed: started.elapsed(),
            }),
            Err(err) => self.rejected(Operation::Stats, actor, err),
        }
        result
    }

    pub fn get_incident(&self, actor: &Actor, id: i64) -> Result<Incident, AppError> {
        let started = Instant::now();
        let result = lifecycle::get_incident(self.store.as_ref(), actor, id);
        match &result {
            Ok(_) => self.observer.on_query(&QueryEvent {
                operation: Operation::Get,
                actor_id: actor.id,
                role: actor.role,
                returned: 1,
                total: None,
                date_stage: None,
                elapsed: started.elapsed(),
            }),
            Err(err) => self.rejected(Operation::Get, actor, err),
        }
        result
    }

    pub fn create_incident(
        &self,
        actor: &Actor,
        new: NewIncident,
        now: OffsetDateTime,
    ) -> Result<Incident, AppError> {
        let result = lifecycle::create_incident(self.store.as_ref(), actor, new, now);
        self.mutated(Operation::Create, actor, result.as_ref().map(|i| i.id));
        result
    }

    pub fn transition_status(
        &self,
        actor: &Actor,
        id: i64,
        target: IncidentStatus,
        now: OffsetDateTime,
    ) -> Result<Incident, AppError> {
        let result = lifecycle::transition_status(
            self.store.as_ref(),
            actor,
            id,
            target,
            now,
            self.config.transition_mode,
        );
        self.mutated(Operation::TransitionStatus, actor, result.as_ref().map(|i| i.id));
        result
    }

    pub fn delete_incident(&self, actor: &Actor, id: i64) -> Result<(), AppError> {
        let result = lifecycle::delete_incident(self.store.as_ref(), actor, id);
        self.mutated(Operation::Delete, actor, result.as_ref().map(|_| id));
        result
    }

    fn mutated(&self, operation: Operation, actor: &Actor, outcome: Result<i64, &AppError>) {
        match outcome {
            Ok(incident_id) => self.observer.on_mutation(&MutationEvent {
                operation,
                actor_id: actor.id,
                role: actor.role,
                incident_id,
            }),
            Err(err) => self.rejected(operation, actor, err),
        }
    }

    fn rejected(&self, operation: Operation, actor: &Actor, err: &AppError) {
        self.observer.on_rejected(&RejectedEvent {
            operation,
            actor_id: actor.id,
            role: actor.role,
            code: err.code.clone(),
            message: err.message.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_accept_request_names() {
        let params: ListParams = serde_json::from_str(
            r#"{"status":["open"],"startDate":"2025-01-15","sort_by":"priority","page":2,"page_size":5}"#,
        )
        .unwrap();
        assert_eq!(params.filters.status, vec!["open".to_string()]);
        assert_eq!(params.filters.start_date.as_deref(), Some("2025-01-15"));
        assert_eq!(params.sort_by.as_deref(), Some("priority"));
        assert_eq!((params.page, params.page_size), (Some(2), Some(5)));
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QueryEngine>();
    }
}
