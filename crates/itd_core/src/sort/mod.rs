use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::Incident;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Priority,
    Status,
}

impl SortKey {
    /// Unknown or missing keys fall back to `created_at`; sorting never fails a request.
    pub fn resolve(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "priority" => Self::Priority,
            "status" => Self::Status,
            _ => Self::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Only an explicit `asc` sorts ascending.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()) {
            Some(r) if r == "asc" => Self::Asc,
            _ => Self::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn resolve(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        Self::new(SortKey::resolve(sort_by), SortDirection::resolve(sort_order))
    }

    pub fn newest_first() -> Self {
        Self::new(SortKey::CreatedAt, SortDirection::Desc)
    }

    /// Primary-key comparison only. Priority and status compare by rank, never by name.
    pub fn compare(&self, a: &Incident, b: &Incident) -> Ordering {
        let ord = match self.key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortKey::Status => a.status.rank().cmp(&b.status.rank()),
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }

    /// Total order: ties on the sort key are broken by ascending id so that
    /// repeated reads and adjacent pages agree.
    pub fn sort(&self, incidents: &mut [Incident]) {
        incidents.sort_by(|a, b| self.compare(a, b).then_with(|| a.id.cmp(&b.id)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IncidentCategory, IncidentPriority, IncidentStatus};
    use time::macros::datetime;
    use time::Duration;

    fn incident(id: i64, priority: IncidentPriority, minutes: i64) -> Incident {
        let at = datetime!(2025-01-01 0:00 UTC) + Duration::minutes(minutes);
        Incident {
            id,
            title: format!("incident {id}"),
            description: "d".to_string(),
            category: IncidentCategory::Software,
            status: IncidentStatus::Open,
            priority,
            created_at: at,
            updated_at: at,
            reporter_id: 1,
            resolver_id: None,
        }
    }

    #[test]
    fn unknown_inputs_fall_back_to_defaults() {
        assert_eq!(SortSpec::resolve(None, None), SortSpec::newest_first());
        assert_eq!(
            SortSpec::resolve(Some("title"), Some("sideways")),
            SortSpec::newest_first()
        );
        assert_eq!(
            SortSpec::resolve(Some("Priority"), Some("ASC")),
            SortSpec::new(SortKey::Priority, SortDirection::Asc)
        );
    }

    #[test]
    fn priority_sorts_by_rank_not_name() {
        let mut rows = vec![
            incident(1, IncidentPriority::Medium, 0),
            incident(2, IncidentPriority::Critical, 1),
            incident(3, IncidentPriority::Low, 2),
            incident(4, IncidentPriority::High, 3),
        ];
        SortSpec::new(SortKey::Priority, SortDirection::Desc).sort(&mut rows);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[test]
    fn ties_break_by_ascending_id_in_both_directions() {
        let mut rows = vec![
            incident(3, IncidentPriority::High, 0),
            incident(1, IncidentPriority::High, 0),
            incident(2, IncidentPriority::High, 0),
        ];
        SortSpec::new(SortKey::Priority, SortDirection::Desc).sort(&mut rows);
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        SortSpec::new(SortKey::CreatedAt, SortDirection::Asc).sort(&mut rows);
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
