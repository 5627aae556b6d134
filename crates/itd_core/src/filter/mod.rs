//! Request filters compiled into predicates.
//!
//! Within a dimension tokens are OR'd (`status in {open, solved}`); dimensions are AND'd.

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::domain::{parse_day, IncidentCategory, IncidentPriority, IncidentStatus};
use crate::error::AppError;
use crate::predicate::Predicate;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilters {
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub priority: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
}

/// Which half of the two-stage date window ended up applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStage {
    ExactDay,
    SinceDay,
}

/// "From this date" filter. Tried first as the exact UTC day; when that matches nothing
/// (together with every other active constraint) it widens to everything since that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    day: Date,
}

impl DateWindow {
    pub fn from_day(day: Date) -> Self {
        Self { day }
    }

    pub fn day(&self) -> Date {
        self.day
    }

    pub fn start_of_day(&self) -> OffsetDateTime {
        self.day.midnight().assume_utc()
    }

    pub fn end_of_day(&self) -> OffsetDateTime {
        self.start_of_day() + (Duration::DAY - Duration::NANOSECOND)
    }

    pub fn predicate(&self, stage: DateStage) -> Predicate {
        match stage {
            DateStage::ExactDay => Predicate::CreatedBetween {
                from: self.start_of_day(),
                to: self.end_of_day(),
            },
            DateStage::SinceDay => Predicate::CreatedSince(self.start_of_day()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    /// Enum and text constraints; `Predicate::All` when nothing was supplied.
    pub constraints: Predicate,
    pub date: Option<DateWindow>,
}

pub fn compile(filters: &ListFilters) -> Result<CompiledFilter, AppError> {
    let statuses = parse_tokens("status", &filters.status, IncidentStatus::from_token)?;
    let priorities = parse_tokens("priority", &filters.priority, IncidentPriority::from_token)?;
    let categories = parse_tokens("category", &filters.category, IncidentCategory::from_token)?;

    let mut parts = Vec::new();
    if !statuses.is_empty() {
        parts.push(Predicate::StatusIn(statuses));
    }
    if !priorities.is_empty() {
        parts.push(Predicate::PriorityIn(priorities));
    }
    if !categories.is_empty() {
        parts.push(Predicate::CategoryIn(categories));
    }
    if let Some(search) = filters.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            parts.push(Predicate::text_contains(search));
        }
    }

    let date = match filters.start_date.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(DateWindow::from_day(parse_start_date(raw)?)),
        _ => None,
    };

    Ok(CompiledFilter {
        constraints: Predicate::all_of(parts),
        date,
    })
}

pub fn parse_start_date(raw: &str) -> Result<Date, AppError> {
    parse_day(raw)
        .ok_or_else(|| AppError::invalid_parameter("start_date", raw, "expected YYYY-MM-DD"))
}

/// Two-stage date strategy.
///
/// `base` must already contain the visibility predicate and every other filter. `probe`
/// counts matches for a candidate predicate; the exact-day stage is kept only when it
/// matches at least one incident.
pub fn apply_date_strategy<F>(
    base: Predicate,
    window: Option<DateWindow>,
    probe: F,
) -> Result<(Predicate, Option<DateStage>), AppError>
where
    F: FnOnce(&Predicate) -> Result<i64, AppError>,
{
    let Some(window) = window else {
        return Ok((base, None));
    };

    let exact = base.clone().and(window.predicate(DateStage::ExactDay));
    if probe(&exact)? > 0 {
        return Ok((exact, Some(DateStage::ExactDay)));
    }
    Ok((
        base.and(window.predicate(DateStage::SinceDay)),
        Some(DateStage::SinceDay),
    ))
}

fn parse_tokens<T: PartialEq>(
    field: &str,
    raw: &[String],
    parse: fn(&str) -> Option<T>,
) -> Result<Vec<T>, AppError> {
    let mut out = Vec::with_capacity(raw.len());
    for token in raw {
        let value = parse(token).ok_or_else(|| {
            AppError::invalid_parameter(field, token, format!("unknown {field} value"))
        })?;
        if !out.contains(&value) {
            out.push(value);
        }
    }
    Ok(out)
}
