use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::domain::{format_day, Actor, IncidentCategory, IncidentStatus, Role};
use crate::error::AppError;
use crate::policy::visible_predicate;
use crate::predicate::Predicate;
use crate::store::{GroupBy, GroupKey, IncidentStore};

pub const DAILY_WINDOW_DAYS: i64 = 7;
pub const RECENT_WINDOW_DAYS: i64 = 90;
pub const SECTOR_ADMIN_CATEGORY_NOTICE: &str = "No category stats for sector admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsWindow {
    #[serde(rename = "last7days", alias = "last-7-days")]
    Last7Days,
    #[serde(rename = "last90days", alias = "last-3-months")]
    Last90Days,
    #[serde(rename = "byCategory", alias = "by-category")]
    ByCategory,
    #[serde(rename = "byStatus", alias = "status-distribution")]
    ByStatus,
}

impl StatsWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Last7Days => "last7days",
            Self::Last90Days => "last90days",
            Self::ByCategory => "byCategory",
            Self::ByStatus => "byStatus",
        }
    }
}

impl FromStr for StatsWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "last7days" | "last-7-days" => Ok(Self::Last7Days),
            "last90days" | "last-3-months" => Ok(Self::Last90Days),
            "byCategory" | "by-category" => Ok(Self::ByCategory),
            "byStatus" | "status-distribution" => Ok(Self::ByStatus),
            _ => Err(AppError::invalid_parameter(
                "window",
                s,
                "expected last7days|last90days|byCategory|byStatus",
            )),
        }
    }
}

/// Per-day status counts, oldest day first. All four vectors have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStatusSeries {
    pub dates: Vec<String>,
    pub open: Vec<i64>,
    pub in_progress: Vec<i64>,
    pub solved: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatsPayload {
    Daily(DailyStatusSeries),
    Status(BTreeMap<IncidentStatus, i64>),
    Category(BTreeMap<IncidentCategory, i64>),
    Notice { message: String },
}

pub fn compute(
    store: &dyn IncidentStore,
    actor: &Actor,
    window: StatsWindow,
    now: OffsetDateTime,
) -> Result<StatsPayload, AppError> {
    let today = now.to_offset(UtcOffset::UTC).date();
    let visible = visible_predicate(actor);

    match window {
        StatsWindow::Last7Days => daily_series(store, visible, today).map(StatsPayload::Daily),
        StatsWindow::Last90Days => {
            let start = days_before(today, RECENT_WINDOW_DAYS)?;
            let predicate = visible.and(Predicate::CreatedSince(start.midnight().assume_utc()));
            status_counts(store, &predicate).map(StatsPayload::Status)
        }
        StatsWindow::ByStatus => status_counts(store, &visible).map(StatsPayload::Status),
        StatsWindow::ByCategory => match actor.role {
            Role::SectorAdmin(_) => Ok(StatsPayload::Notice {
                message: SECTOR_ADMIN_CATEGORY_NOTICE.to_string(),
            }),
            Role::SystemAdmin | Role::User => {
                category_counts(store, &visible).map(StatsPayload::Category)
            }
        },
    }
}

fn days_before(today: Date, days: i64) -> Result<Date, AppError> {
    today.checked_sub(Duration::days(days)).ok_or_else(|| {
        AppError::invalid_parameter("now", &today.to_string(), "date window underflows")
    })
}

fn daily_series(
    store: &dyn IncidentStore,
    visible: Predicate,
    today: Date,
) -> Result<DailyStatusSeries, AppError> {
    let first = days_before(today, DAILY_WINDOW_DAYS - 1)?;
    let days: Vec<Date> = (0..DAILY_WINDOW_DAYS)
        .map(|offset| first + Duration::days(offset))
        .collect();

    let predicate = visible.and(Predicate::CreatedSince(first.midnight().assume_utc()));
    let counts = store.count_incidents(&predicate, GroupBy::DayAndStatus)?;

    let len = days.len();
    let mut series = DailyStatusSeries {
        dates: days.iter().map(|d| format_day(*d)).collect::<Result<_, _>>()?,
        open: vec![0; len],
        in_progress: vec![0; len],
        solved: vec![0; len],
    };

    for (key, n) in counts {
        let GroupKey::DayAndStatus(day, status) = key else {
            continue;
        };
        // Rows dated after today are outside the window.
        let Some(idx) = days.iter().position(|d| *d == day) else {
            continue;
        };
        let column = match status {
            IncidentStatus::Open => &mut series.open,
            IncidentStatus::InProgress => &mut series.in_progress,
            IncidentStatus::Solved => &mut series.solved,
        };
        column[idx] = n;
    }
    Ok(series)
}

fn status_counts(
    store: &dyn IncidentStore,
    predicate: &Predicate,
) -> Result<BTreeMap<IncidentStatus, i64>, AppError> {
    let mut out: BTreeMap<IncidentStatus, i64> =
        IncidentStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for (key, n) in store.count_incidents(predicate, GroupBy::Status)? {
        if let GroupKey::Status(status) = key {
            out.insert(status, n);
        }
    }
    Ok(out)
}

fn category_counts(
    store: &dyn IncidentStore,
    predicate: &Predicate,
) -> Result<BTreeMap<IncidentCategory, i64>, AppError> {
    let mut out: BTreeMap<IncidentCategory, i64> =
        IncidentCategory::ALL.into_iter().map(|c| (c, 0)).collect();
    for (key, n) in store.count_incidents(predicate, GroupBy::Category)? {
        if let GroupKey::Category(category) = key {
            out.insert(category, n);
        }
    }
    Ok(out)
}
