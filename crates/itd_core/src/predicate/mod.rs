//! Composable predicate over incidents.
//!
//! Predicates are plain data so every store can evaluate them its own way: the memory
//! store calls [`Predicate::matches`], the SQLite store renders them to a `WHERE` clause.

use time::OffsetDateTime;

use crate::domain::{Incident, IncidentCategory, IncidentPriority, IncidentStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All,
    ReporterIs(i64),
    ResolverIs(i64),
    ResolverIsNull,
    StatusIn(Vec<IncidentStatus>),
    PriorityIn(Vec<IncidentPriority>),
    CategoryIn(Vec<IncidentCategory>),
    /// Lowercased needle matched against title OR description.
    TextContains(String),
    /// Inclusive on both ends.
    CreatedBetween {
        from: OffsetDateTime,
        to: OffsetDateTime,
    },
    CreatedSince(OffsetDateTime),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn text_contains(needle: &str) -> Self {
        Self::TextContains(needle.to_lowercase())
    }

    /// Conjunction; `All` is the identity and nested `And`s are flattened.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    pub fn all_of(parts: impl IntoIterator<Item = Predicate>) -> Predicate {
        parts.into_iter().fold(Predicate::All, Predicate::and)
    }

    pub fn matches(&self, incident: &Incident) -> bool {
        match self {
            Predicate::All => true,
            Predicate::ReporterIs(id) => incident.reporter_id == *id,
            Predicate::ResolverIs(id) => incident.resolver_id == Some(*id),
            Predicate::ResolverIsNull => incident.resolver_id.is_none(),
            Predicate::StatusIn(set) => set.contains(&incident.status),
            Predicate::PriorityIn(set) => set.contains(&incident.priority),
            Predicate::CategoryIn(set) => set.contains(&incident.category),
            Predicate::TextContains(needle) => {
                incident.title.to_lowercase().contains(needle.as_str())
                    || incident.description.to_lowercase().contains(needle.as_str())
            }
            Predicate::CreatedBetween { from, to } => {
                incident.created_at >= *from && incident.created_at <= *to
            }
            Predicate::CreatedSince(from) => incident.created_at >= *from,
            Predicate::And(parts) => parts.iter().all(|p| p.matches(incident)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(incident)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn incident() -> Incident {
        Incident {
            id: 1,
            title: "VPN drops every hour".to_string(),
            description: "Remote staff lose the tunnel".to_string(),
            category: IncidentCategory::Network,
            status: IncidentStatus::Open,
            priority: IncidentPriority::High,
            created_at: datetime!(2025-01-15 10:30 UTC),
            updated_at: datetime!(2025-01-15 10:30 UTC),
            reporter_id: 4,
            resolver_id: None,
        }
    }

    #[test]
    fn and_flattens_and_drops_identity() {
        let p = Predicate::All
            .and(Predicate::ReporterIs(1))
            .and(Predicate::All)
            .and(Predicate::ResolverIsNull.and(Predicate::ResolverIs(2)));
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::ReporterIs(1),
                Predicate::ResolverIsNull,
                Predicate::ResolverIs(2),
            ])
        );
        assert_eq!(Predicate::all_of(Vec::new()), Predicate::All);
    }

    #[test]
    fn empty_or_matches_nothing() {
        assert!(!Predicate::Or(Vec::new()).matches(&incident()));
        assert!(Predicate::And(Vec::new()).matches(&incident()));
    }

    #[test]
    fn text_search_is_case_insensitive_over_title_and_description() {
        assert!(Predicate::text_contains("vpn").matches(&incident()));
        assert!(Predicate::text_contains("TUNNEL").matches(&incident()));
        assert!(!Predicate::text_contains("printer").matches(&incident()));
    }

    #[test]
    fn created_between_is_inclusive() {
        let at = datetime!(2025-01-15 10:30 UTC);
        let p = Predicate::CreatedBetween { from: at, to: at };
        assert!(p.matches(&incident()));
        assert!(Predicate::CreatedSince(at).matches(&incident()));
        assert!(!Predicate::CreatedSince(datetime!(2025-01-15 10:31 UTC)).matches(&incident()));
    }
}
