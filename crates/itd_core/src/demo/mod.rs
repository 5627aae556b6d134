use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::domain::{IncidentCategory, IncidentPriority, IncidentStatus};
use crate::error::AppError;
use crate::store::{IncidentDraft, IncidentStore};

pub const DEMO_INCIDENT_COUNT: usize = 40;

/// Reporter ids used by the demo dataset.
pub const DEMO_REPORTERS: [i64; 4] = [101, 102, 103, 104];

/// Resolver ids used by the demo dataset; one per sector, in `IncidentCategory::ALL` order.
pub const DEMO_RESOLVERS: [i64; 4] = [201, 202, 203, 204];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoSeedSummary {
    pub inserted: usize,
    pub first_id: Option<i64>,
    pub last_id: Option<i64>,
}

/// Deterministic demo dataset spread over the 60 days before `now`, so both the daily and
/// the 90-day stats windows have data.
pub fn demo_drafts(now: OffsetDateTime) -> Vec<IncidentDraft> {
    let subjects = [
        "Laptop will not boot",
        "ERP client crashes on export",
        "VPN drops every hour",
        "Phishing mail reported",
        "Docking station flickers",
        "License server unreachable",
        "Wi-Fi dead zone on floor 3",
        "Suspicious login from abroad",
    ];
    let statuses = [
        IncidentStatus::Open,
        IncidentStatus::InProgress,
        IncidentStatus::Solved,
        IncidentStatus::Open,
        IncidentStatus::Solved,
    ];

    (0..DEMO_INCIDENT_COUNT)
        .map(|i| {
            let category = IncidentCategory::ALL[i % IncidentCategory::ALL.len()];
            let priority = IncidentPriority::ALL[(i / 2) % IncidentPriority::ALL.len()];
            let status = statuses[i % statuses.len()];
            let created_at = now - Duration::days((i as i64 * 3) % 60) - Duration::hours(i as i64 % 9);
            // Unclaimed open incidents keep the sector queues interesting.
            let resolver_id = match status {
                IncidentStatus::Open => None,
                _ => Some(DEMO_RESOLVERS[i % DEMO_RESOLVERS.len()]),
            };
            IncidentDraft {
                title: format!("{} #{}", subjects[i % subjects.len()], i + 1),
                description: format!(
                    "Demo {} incident {} reported for triage.",
                    category.as_str(),
                    i + 1
                ),
                category,
                status,
                priority,
                created_at,
                updated_at: created_at,
                reporter_id: DEMO_REPORTERS[i % DEMO_REPORTERS.len()],
                resolver_id,
            }
        })
        .collect()
}

pub fn seed_demo_dataset(
    store: &dyn IncidentStore,
    now: OffsetDateTime,
) -> Result<DemoSeedSummary, AppError> {
    let mut summary = DemoSeedSummary {
        inserted: 0,
        first_id: None,
        last_id: None,
    };
    for draft in demo_drafts(now) {
        let incident = store.insert_incident(draft)?;
        summary.first_id.get_or_insert(incident.id);
        summary.last_id = Some(incident.id);
        summary.inserted += 1;
    }
    tracing::info!(inserted = summary.inserted, "seeded demo incidents");
    Ok(summary)
}
