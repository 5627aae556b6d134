use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use itd_core::config::EngineConfig;
use itd_core::demo::seed_demo_dataset;
use itd_core::domain::{Actor, IncidentCategory, IncidentPriority, IncidentStatus, NewIncident};
use itd_core::error::{AppError, OUTPUT_FAILED};
use itd_core::filter::ListFilters;
use itd_core::stats::StatsWindow;
use itd_core::store::SqliteStore;
use itd_core::{ListParams, QueryEngine, SearchParams};

use crate::{ActorArgs, Cli, Command, CreateArgs, ListArgs, SearchArgs};

#[derive(Debug, Serialize)]
struct InitDbResponse {
    db_path: String,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    ok: bool,
    id: i64,
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| {
        AppError::new(OUTPUT_FAILED, "Failed to serialize command output")
            .with_details(e.to_string())
    })
}

fn open_engine(db: &Path) -> Result<QueryEngine, AppError> {
    let config = EngineConfig::from_env()?;
    let store = SqliteStore::open(db)?;
    tracing::debug!(db = %db.display(), ?config, "opened incident store");
    Ok(QueryEngine::new(store).with_config(config))
}

fn resolve_actor(args: &ActorArgs) -> Result<Actor, AppError> {
    match (args.actor_id, args.role.as_deref()) {
        (Some(id), Some(role)) => Actor::new(id, role, args.sector.as_deref()),
        (id, role) => Err(AppError::forbidden("An actor identity is required")
            .with_details(format!(
                "actor_id={}; role={}",
                id.map_or_else(|| "missing".to_string(), |id| id.to_string()),
                role.unwrap_or("missing")
            ))),
    }
}

impl From<ListArgs> for ListParams {
    fn from(args: ListArgs) -> Self {
        ListParams {
            filters: ListFilters {
                status: args.status,
                priority: args.priority,
                category: args.category,
                search: args.search,
                start_date: args.start_date,
            },
            sort_by: args.sort_by,
            sort_order: args.sort_order,
            page: args.page,
            page_size: args.page_size,
        }
    }
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        SearchParams {
            q: args.q,
            skip: args.skip,
            limit: args.limit,
        }
    }
}

fn new_incident(args: CreateArgs) -> Result<NewIncident, AppError> {
    Ok(NewIncident {
        title: args.title,
        description: args.description,
        category: args.category.parse::<IncidentCategory>()?,
        priority: args.priority.parse::<IncidentPriority>()?,
    })
}

pub fn run(cli: Cli) -> Result<Value, AppError> {
    let Cli {
        db,
        actor: actor_args,
        command,
    } = cli;
    let engine = open_engine(&db)?;
    let now = OffsetDateTime::now_utc();

    match command {
        Command::Init => to_json(&InitDbResponse {
            db_path: db.display().to_string(),
        }),
        Command::SeedDemo => to_json(&seed_demo_dataset(engine.store(), now)?),
        Command::List(args) => {
            let actor = resolve_actor(&actor_args)?;
            to_json(&engine.list(&actor, &ListParams::from(args))?)
        }
        Command::Search(args) => {
            let actor = resolve_actor(&actor_args)?;
            to_json(&engine.search(&actor, &SearchParams::from(args))?)
        }
        Command::Stats { window } => {
            let actor = resolve_actor(&actor_args)?;
            let window = window.parse::<StatsWindow>()?;
            to_json(&engine.stats(&actor, window, now)?)
        }
        Command::Get { id } => {
            let actor = resolve_actor(&actor_args)?;
            to_json(&engine.get_incident(&actor, id)?)
        }
        Command::Create(args) => {
            let actor = resolve_actor(&actor_args)?;
            to_json(&engine.create_incident(&actor, new_incident(args)?, now)?)
        }
        Command::SetStatus { id, status } => {
            let actor = resolve_actor(&actor_args)?;
            let target = status.parse::<IncidentStatus>()?;
            to_json(&engine.transition_status(&actor, id, target, now)?)
        }
        Command::Delete { id } => {
            let actor = resolve_actor(&actor_args)?;
            engine.delete_incident(&actor, id)?;
            to_json(&DeleteResponse { ok: true, id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn run_args(db: &Path, args: &[&str]) -> Result<Value, AppError> {
        let db = db.display().to_string();
        let mut argv = vec!["itd", "--db", db.as_str()];
        argv.extend_from_slice(args);
        run(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn create_then_list_as_reporter() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("itd.sqlite");

        let created = run_args(
            &db,
            &[
                "--role", "user", "--actor-id", "5", "create", "--title", "Printer jam",
                "--description", "Tray 2 jams", "--category", "hardware", "--priority", "low",
            ],
        )
        .unwrap();
        assert_eq!(created["reporter_id"], 5);
        assert_eq!(created["status"], "open");

        let page = run_args(&db, &["--role", "user", "--actor-id", "5", "list"]).unwrap();
        assert_eq!(page["pagination"]["total_count"], 1);

        let other = run_args(&db, &["--role", "user", "--actor-id", "6", "list"]).unwrap();
        assert_eq!(other["pagination"]["total_count"], 0);
    }

    #[test]
    fn bad_status_token_is_invalid_parameter() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("itd.sqlite");
        let err = run_args(
            &db,
            &["--role", "admin_system", "--actor-id", "1", "list", "--status", "archived"],
        )
        .unwrap_err();
        assert_eq!(err.code, itd_core::error::INVALID_PARAMETER);
    }

    #[test]
    fn missing_actor_is_rejected_instead_of_defaulting_to_admin() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("itd.sqlite");
        run_args(&db, &["seed-demo"]).unwrap();

        for args in [
            vec!["list"],
            vec!["--role", "admin_system", "list"],
            vec!["--actor-id", "1", "list"],
            vec!["stats", "byStatus"],
            vec!["delete", "1"],
            vec!["set-status", "1", "in_progress"],
        ] {
            let err = run_args(&db, &args).unwrap_err();
            assert_eq!(err.code, itd_core::error::FORBIDDEN, "{args:?}");
        }

        let still_there = run_args(&db, &["--role", "admin_system", "--actor-id", "1", "get", "1"]).unwrap();
        assert_eq!(still_there["id"], 1);
    }
}
