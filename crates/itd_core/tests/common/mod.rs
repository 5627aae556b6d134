#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use itd_core::domain::{Incident, IncidentCategory, IncidentPriority, IncidentStatus};
use itd_core::observe::{MutationEvent, QueryEvent, QueryObserver, RejectedEvent};
use itd_core::store::{IncidentDraft, IncidentStore, MemoryStore};

/// Fixed clock for every test: 2025-01-15 12:00 UTC.
pub const NOW: OffsetDateTime = datetime!(2025-01-15 12:00 UTC);

pub fn draft(
    title: &str,
    category: IncidentCategory,
    status: IncidentStatus,
    priority: IncidentPriority,
    created_at: OffsetDateTime,
    reporter_id: i64,
    resolver_id: Option<i64>,
) -> IncidentDraft {
    IncidentDraft {
        title: title.to_string(),
        description: format!("{title} (details)"),
        category,
        status,
        priority,
        created_at,
        updated_at: created_at,
        reporter_id,
        resolver_id,
    }
}

/// Mixed fixture used across the query tests.
///
/// Reporters are 1, 2 and 3; admins 10 (network) and 11 (security) have claimed some rows.
pub fn fixture_drafts() -> Vec<IncidentDraft> {
    use IncidentCategory::*;
    use IncidentPriority::*;
    use IncidentStatus::*;

    let day = |d: i64, h: i64| NOW - Duration::days(d) + Duration::hours(h - 12);
    vec![
        draft("VPN drops every hour", Network, Open, High, day(0, 9), 1, None),
        draft("Switch port flapping", Network, InProgress, Critical, day(1, 10), 2, Some(10)),
        draft("Wi-Fi dead zone", Network, Open, Low, day(2, 8), 3, None),
        draft("Firewall rule request", Network, Solved, Medium, day(3, 14), 1, Some(11)),
        draft("Laptop will not boot", Hardware, Open, Medium, day(0, 11), 2, None),
        draft("Printer offline", Hardware, Solved, Low, day(5, 9), 1, Some(12)),
        draft("ERP crash on export", Software, InProgress, High, day(10, 16), 3, Some(13)),
        draft("License server vpn certificate", Software, Open, Critical, day(20, 7), 1, None),
        draft("Phishing mail reported", Security, Open, High, day(0, 10), 2, None),
        draft("Suspicious login", Security, InProgress, Critical, day(40, 13), 3, Some(11)),
        draft("Badge reader fault", Hardware, Open, Medium, day(100, 9), 2, None),
        draft("Malware alert on laptop", Security, Solved, High, day(6, 15), 1, Some(11)),
    ]
}

pub fn seed(store: &dyn IncidentStore, drafts: Vec<IncidentDraft>) -> Vec<Incident> {
    drafts
        .into_iter()
        .map(|d| store.insert_incident(d).expect("insert"))
        .collect()
}

pub fn memory_store() -> (MemoryStore, Vec<Incident>) {
    let store = MemoryStore::new();
    let rows = seed(&store, fixture_drafts());
    (store, rows)
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub queries: Mutex<Vec<QueryEvent>>,
    pub rejected: Mutex<Vec<RejectedEvent>>,
    pub mutations: Mutex<Vec<MutationEvent>>,
}

impl RecordingObserver {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl QueryObserver for RecordingObserver {
    fn on_query(&self, event: &QueryEvent) {
        self.queries.lock().unwrap().push(event.clone());
    }

    fn on_rejected(&self, event: &RejectedEvent) {
        self.rejected.lock().unwrap().push(event.clone());
    }

    fn on_mutation(&self, event: &MutationEvent) {
        self.mutations.lock().unwrap().push(event.clone());
    }
}
