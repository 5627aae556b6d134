use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::{AppError, DAY_FORMAT_FAILED, VALIDATION_FAILED};

pub mod actor;

pub use actor::{Actor, Role};

pub const TITLE_MAX_CHARS: usize = 255;

/// Rank used for any priority the table below does not know about.
pub const UNRANKED_PRIORITY: u8 = 5;
/// Ordinal ranking for priority ordering; never lexicographic.
pub const PRIORITY_RANKS: [(IncidentPriority, u8); 4] = [
    (IncidentPriority::Low, 1),
    (IncidentPriority::Medium, 2),
    (IncidentPriority::High, 3),
    (IncidentPriority::Critical, 4),
];

/// Rank used for any status the table below does not know about.
pub const UNRANKED_STATUS: u8 = 4;
pub const STATUS_RANKS: [(IncidentStatus, u8); 3] = [
    (IncidentStatus::Open, 1),
    (IncidentStatus::InProgress, 2),
    (IncidentStatus::Solved, 3),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    InProgress,
    Solved,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 3] = [Self::Open, Self::InProgress, Self::Solved];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Solved => "solved",
        }
    }

    pub fn from_token(raw: &str) -> Option<Self> {
        let token = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == token)
    }

    pub fn rank(self) -> u8 {
        STATUS_RANKS
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, rank)| *rank)
            .unwrap_or(UNRANKED_STATUS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl IncidentPriority {
    pub const ALL: [IncidentPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_token(raw: &str) -> Option<Self> {
        let token = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == token)
    }

    pub fn rank(self) -> u8 {
        PRIORITY_RANKS
            .iter()
            .find(|(priority, _)| *priority == self)
            .map(|(_, rank)| *rank)
            .unwrap_or(UNRANKED_PRIORITY)
    }
}

/// Incident category. Doubles as the sector vocabulary of sector admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Hardware,
    Software,
    Network,
    Security,
}

impl IncidentCategory {
    pub const ALL: [IncidentCategory; 4] =
        [Self::Hardware, Self::Software, Self::Network, Self::Security];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Software => "software",
            Self::Network => "network",
            Self::Security => "security",
        }
    }

    pub fn from_token(raw: &str) -> Option<Self> {
        let token = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == token)
    }
}

macro_rules! token_enum_impls {
    ($ty:ty, $field:literal, $expected:literal) => {
        impl FromStr for $ty {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_token(s).ok_or_else(|| {
                    AppError::invalid_parameter($field, s, concat!("expected one of ", $expected))
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

token_enum_impls!(IncidentStatus, "status", "open|in_progress|solved");
token_enum_impls!(IncidentPriority, "priority", "low|medium|high|critical");
token_enum_impls!(IncidentCategory, "category", "hardware|software|network|security");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub id: i64,
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

impl Incident {
    /// Calendar day (UTC) the incident was created on; the stats bucket key.
    pub fn created_day(&self) -> Date {
        self.created_at.to_offset(UtcOffset::UTC).date()
    }
}

/// Payload a reporter submits. The reporter itself is always the acting actor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    pub category: IncidentCategory,
    pub priority: IncidentPriority,
}

impl NewIncident {
    pub fn validate(&self) -> Result<(), AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::new(VALIDATION_FAILED, "Title must not be empty")
                .with_details("field=title"));
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(AppError::new(
                VALIDATION_FAILED,
                format!("Title must be at most {TITLE_MAX_CHARS} characters"),
            )
            .with_details("field=title"));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::new(VALIDATION_FAILED, "Description must not be empty")
                .with_details("field=description"));
        }
        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_day(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_day(day: Date) -> Result<String, AppError> {
    day.format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| {
            AppError::new(DAY_FORMAT_FAILED, "Failed to format calendar day")
                .with_details(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn tokens_parse_case_insensitively() {
        assert_eq!(IncidentStatus::from_token(" In_Progress "), Some(IncidentStatus::InProgress));
        assert_eq!(IncidentPriority::from_token("CRITICAL"), Some(IncidentPriority::Critical));
        assert_eq!(IncidentCategory::from_token("network"), Some(IncidentCategory::Network));
        assert_eq!(IncidentStatus::from_token("archived"), None);
    }

    #[test]
    fn from_str_names_the_field() {
        let err = "urgent".parse::<IncidentPriority>().unwrap_err();
        assert_eq!(err.code, crate::error::INVALID_PARAMETER);
        assert_eq!(err.details.as_deref(), Some("field=priority; value=urgent"));
    }

    #[test]
    fn rank_tables_are_ordinal() {
        let ranks: Vec<u8> = IncidentPriority::ALL.iter().map(|p| p.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        let ranks: Vec<u8> = IncidentStatus::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn new_incident_validation() {
        let mut new = NewIncident {
            title: "Printer offline".to_string(),
            description: "Second floor printer does not respond".to_string(),
            category: IncidentCategory::Hardware,
            priority: IncidentPriority::High,
        };
        assert!(new.validate().is_ok());

        new.title = "   ".to_string();
        assert_eq!(new.validate().unwrap_err().details.as_deref(), Some("field=title"));

        new.title = "x".repeat(TITLE_MAX_CHARS + 1);
        assert!(new.validate().is_err());

        new.title = "ok".to_string();
        new.description = String::new();
        assert_eq!(
            new.validate().unwrap_err().details.as_deref(),
            Some("field=description")
        );
    }

    #[test]
    fn day_parse_and_format() {
        assert_eq!(parse_day("2025-03-09"), Some(date!(2025 - 03 - 09)));
        assert_eq!(parse_day("2025-3-9"), None);
        assert_eq!(parse_day("09/03/2025"), None);
        assert_eq!(format_day(date!(2025 - 03 - 09)).unwrap(), "2025-03-09");
    }
}
