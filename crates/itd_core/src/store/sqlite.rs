use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use time::OffsetDateTime;

use super::{GroupBy, GroupKey, IncidentDraft, IncidentStore, StatusDecision};
use crate::db;
use crate::domain::{
    Incident, IncidentCategory, IncidentPriority, IncidentStatus, PRIORITY_RANKS, STATUS_RANKS,
    UNRANKED_PRIORITY, UNRANKED_STATUS,
};
use crate::error::{AppError, STORE_LOCK_POISONED, STORE_QUERY_FAILED, STORE_WRITE_FAILED};
use crate::predicate::Predicate;
use crate::sort::{SortDirection, SortKey, SortSpec};

const SELECT_COLUMNS: &str = r#"
      SELECT
        id, title, description, category, status, priority,
        created_at_us, updated_at_us, reporter_id, resolver_id
      FROM incidents
"#;

/// SQLite-backed store. Timestamps are persisted as UTC microseconds.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        Self::from_connection(db::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(db::open_in_memory()?)
    }

    /// Takes ownership of an open connection, registers the engine's SQL functions and
    /// ensures the incidents schema exists.
    pub fn from_connection(mut conn: Connection) -> Result<Self, AppError> {
        db::register_functions(&conn)?;
        db::ensure_schema(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn.lock().map_err(|e| {
            AppError::new(STORE_LOCK_POISONED, "SQLite connection lock poisoned")
                .with_details(e.to_string())
        })
    }
}

struct IncidentRow {
    id: i64,
    title: String,
    description: String,
    category: String,
    status: String,
    priority: String,
    created_at_us: i64,
    updated_at_us: i64,
    reporter_id: i64,
    resolver_id: Option<i64>,
}

impl IncidentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            status: row.get(4)?,
            priority: row.get(5)?,
            created_at_us: row.get(6)?,
            updated_at_us: row.get(7)?,
            reporter_id: row.get(8)?,
            resolver_id: row.get(9)?,
        })
    }

    fn into_incident(self) -> Result<Incident, AppError> {
        Ok(Incident {
            category: decode_token(self.id, "category", &self.category, IncidentCategory::from_token)?,
            status: decode_token(self.id, "status", &self.status, IncidentStatus::from_token)?,
            priority: decode_token(self.id, "priority", &self.priority, IncidentPriority::from_token)?,
            created_at: from_micros(self.created_at_us)?,
            updated_at: from_micros(self.updated_at_us)?,
            id: self.id,
            title: self.title,
            description: self.description,
            reporter_id: self.reporter_id,
            resolver_id: self.resolver_id,
        })
    }
}

fn decode_token<T>(id: i64, column: &str, raw: &str, parse: fn(&str) -> Option<T>) -> Result<T, AppError> {
    parse(raw).ok_or_else(|| {
        AppError::new(STORE_QUERY_FAILED, "Stored incident has an unknown enum value")
            .with_details(format!("id={id}; column={column}; value={raw}"))
    })
}

pub(crate) fn to_micros(ts: OffsetDateTime) -> i64 {
    let micros = ts.unix_timestamp_nanos().div_euclid(1_000);
    i64::try_from(micros).unwrap_or(if micros < 0 { i64::MIN } else { i64::MAX })
}

pub(crate) fn from_micros(us: i64) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(us) * 1_000).map_err(|e| {
        AppError::new(STORE_QUERY_FAILED, "Stored timestamp is out of range")
            .with_details(format!("micros={us}; {e}"))
    })
}

/// Renders a predicate to a SQL boolean expression, pushing bound values onto `params`.
fn render_predicate(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::All => "1=1".to_string(),
        Predicate::ReporterIs(id) => {
            params.push(Value::Integer(*id));
            "reporter_id = ?".to_string()
        }
        Predicate::ResolverIs(id) => {
            params.push(Value::Integer(*id));
            "resolver_id = ?".to_string()
        }
        Predicate::ResolverIsNull => "resolver_id IS NULL".to_string(),
        Predicate::StatusIn(set) => render_in("status", set.iter().map(|s| s.as_str()), params),
        Predicate::PriorityIn(set) => render_in("priority", set.iter().map(|p| p.as_str()), params),
        Predicate::CategoryIn(set) => render_in("category", set.iter().map(|c| c.as_str()), params),
        Predicate::TextContains(needle) => {
            params.push(Value::Text(needle.clone()));
            params.push(Value::Text(needle.clone()));
            "(instr(itd_lower(title), ?) > 0 OR instr(itd_lower(description), ?) > 0)".to_string()
        }
        Predicate::CreatedBetween { from, to } => {
            params.push(Value::Integer(to_micros(*from)));
            params.push(Value::Integer(to_micros(*to)));
            "(created_at_us >= ? AND created_at_us <= ?)".to_string()
        }
        Predicate::CreatedSince(from) => {
            params.push(Value::Integer(to_micros(*from)));
            "created_at_us >= ?".to_string()
        }
        Predicate::And(parts) => render_joined(parts, " AND ", "1=1", params),
        Predicate::Or(parts) => render_joined(parts, " OR ", "1=0", params),
    }
}

fn render_in<'a>(
    column: &str,
    tokens: impl Iterator<Item = &'a str>,
    params: &mut Vec<Value>,
) -> String {
    let mut placeholders = Vec::new();
    for token in tokens {
        params.push(Value::Text(token.to_string()));
        placeholders.push("?");
    }
    if placeholders.is_empty() {
        return "1=0".to_string();
    }
    format!("{column} IN ({})", placeholders.join(", "))
}

fn render_joined(parts: &[Predicate], sep: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts.iter().map(|p| render_predicate(p, params)).collect();
    format!("({})", rendered.join(sep))
}

fn rank_case<T: Copy>(column: &str, ranks: &[(T, u8)], token: fn(T) -> &'static str, unranked: u8) -> String {
    let mut sql = String::from("CASE ");
    sql.push_str(column);
    for (value, rank) in ranks {
        sql.push_str(&format!(" WHEN '{}' THEN {rank}", token(*value)));
    }
    sql.push_str(&format!(" ELSE {unranked} END"));
    sql
}

fn render_order_by(sort: &SortSpec) -> String {
    let key = match sort.key {
        SortKey::CreatedAt => "created_at_us".to_string(),
        SortKey::Priority => rank_case("priority", &PRIORITY_RANKS, IncidentPriority::as_str, UNRANKED_PRIORITY),
        SortKey::Status => rank_case("status", &STATUS_RANKS, IncidentStatus::as_str, UNRANKED_STATUS),
    };
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    format!("ORDER BY {key} {direction}, id ASC")
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn query_failed(message: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::new(STORE_QUERY_FAILED, message).with_details(e.to_string())
}

fn write_failed(message: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::new(STORE_WRITE_FAILED, message).with_details(e.to_string())
}

fn fetch_incident(conn: &Connection, id: i64) -> Result<Option<Incident>, AppError> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id], IncidentRow::from_row)
        .optional()
        .map_err(query_failed("Failed to load incident"))?;
    row.map(IncidentRow::into_incident).transpose()
}

impl IncidentStore for SqliteStore {
    fn query_incidents(
        &self,
        predicate: &Predicate,
        sort: &SortSpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Incident>, AppError> {
        let mut params = Vec::new();
        let where_clause = render_predicate(predicate, &mut params);
        params.push(Value::Integer(clamp_i64(limit)));
        params.push(Value::Integer(clamp_i64(offset)));
        let sql = format!(
            "{SELECT_COLUMNS} WHERE {where_clause} {} LIMIT ? OFFSET ?",
            render_order_by(sort)
        );

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(query_failed("Failed to prepare incidents query"))?;
        let rows = stmt
            .query_map(params_from_iter(params), IncidentRow::from_row)
            .map_err(query_failed("Failed to query incidents"))?;

        let mut out = Vec::new();
        for r in rows {
            let row = r.map_err(query_failed("Failed to decode incident row"))?;
            out.push(row.into_incident()?);
        }
        Ok(out)
    }

    fn count_incidents(
        &self,
        predicate: &Predicate,
        group_by: GroupBy,
    ) -> Result<BTreeMap<GroupKey, i64>, AppError> {
        let mut params = Vec::new();
        let where_clause = render_predicate(predicate, &mut params);
        let conn = self.lock()?;
        let mut out = BTreeMap::new();

        match group_by {
            GroupBy::Total => {
                let total: i64 = conn
                    .query_row(
                        &format!("SELECT COUNT(*) FROM incidents WHERE {where_clause}"),
                        params_from_iter(params),
                        |row| row.get(0),
                    )
                    .map_err(query_failed("Failed to count incidents"))?;
                if total > 0 {
                    out.insert(GroupKey::Total, total);
                }
            }
            GroupBy::Status | GroupBy::Category => {
                let column = if group_by == GroupBy::Status { "status" } else { "category" };
                let sql = format!(
                    "SELECT {column}, COUNT(*) FROM incidents WHERE {where_clause} GROUP BY {column}"
                );
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(query_failed("Failed to prepare grouped count"))?;
                let rows = stmt
                    .query_map(params_from_iter(params), |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })
                    .map_err(query_failed("Failed to run grouped count"))?;
                for r in rows {
                    let (token, n) = r.map_err(query_failed("Failed to decode grouped count"))?;
                    let key = if group_by == GroupBy::Status {
                        GroupKey::Status(decode_token(0, column, &token, IncidentStatus::from_token)?)
                    } else {
                        GroupKey::Category(decode_token(0, column, &token, IncidentCategory::from_token)?)
                    };
                    out.insert(key, n);
                }
            }
            GroupBy::DayAndStatus => {
                // Day boundaries are UTC calendar days; bucket in Rust rather than in SQL date math.
                let sql = format!("SELECT created_at_us, status FROM incidents WHERE {where_clause}");
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(query_failed("Failed to prepare daily count"))?;
                let rows = stmt
                    .query_map(params_from_iter(params), |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                    })
                    .map_err(query_failed("Failed to run daily count"))?;
                for r in rows {
                    let (us, token) = r.map_err(query_failed("Failed to decode daily count"))?;
                    let day = from_micros(us)?.date();
                    let status = decode_token(0, "status", &token, IncidentStatus::from_token)?;
                    *out.entry(GroupKey::DayAndStatus(day, status)).or_insert(0) += 1;
                }
            }
        }
        Ok(out)
    }

    fn get_incident(&self, id: i64) -> Result<Option<Incident>, AppError> {
        let conn = self.lock()?;
        fetch_incident(&conn, id)
    }

    fn insert_incident(&self, draft: IncidentDraft) -> Result<Incident, AppError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
      INSERT INTO incidents(
        title, description, category, status, priority,
        created_at_us, updated_at_us, reporter_id, resolver_id
      ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
      "#,
            rusqlite::params![
                draft.title,
                draft.description,
                draft.category.as_str(),
                draft.status.as_str(),
                draft.priority.as_str(),
                to_micros(draft.created_at),
                to_micros(draft.updated_at),
                draft.reporter_id,
                draft.resolver_id,
            ],
        )
        .map_err(write_failed("Failed to insert incident"))?;

        let id = conn.last_insert_rowid();
        fetch_incident(&conn, id)?.ok_or_else(|| {
            AppError::new(STORE_WRITE_FAILED, "Inserted incident could not be read back")
                .with_details(format!("id={id}"))
        })
    }

    fn update_status(
        &self,
        id: i64,
        now: OffsetDateTime,
        decide: StatusDecision<'_>,
    ) -> Result<Incident, AppError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(write_failed("Failed to start status transaction"))?;

        let current = fetch_incident(&tx, id)?.ok_or_else(|| AppError::not_found(id))?;
        // An Err from `decide` drops `tx`, which rolls back.
        let change = decide(&current)?;

        tx.execute(
            "UPDATE incidents SET status = ?1, resolver_id = ?2, updated_at_us = ?3 WHERE id = ?4",
            rusqlite::params![change.status.as_str(), change.resolver_id, to_micros(now), id],
        )
        .map_err(write_failed("Failed to update incident status"))?;

        let updated = fetch_incident(&tx, id)?.ok_or_else(|| AppError::not_found(id))?;
        tx.commit()
            .map_err(write_failed("Failed to commit status transaction"))?;
        Ok(updated)
    }

    fn delete_incident(&self, id: i64) -> Result<bool, AppError> {
        let conn = self.lock()?;
        let n = conn
            .execute("DELETE FROM incidents WHERE id = ?1", [id])
            .map_err(write_failed("Failed to delete incident"))?;
        Ok(n > 0)
    }
}
