mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use time::macros::datetime;

use itd_core::domain::{Actor, IncidentCategory, IncidentPriority, IncidentStatus, NewIncident};
use itd_core::error::INVALID_TRANSITION;
use itd_core::filter::ListFilters;
use itd_core::predicate::Predicate;
use itd_core::sort::{SortDirection, SortKey, SortSpec};
use itd_core::store::{GroupBy, IncidentStore, MemoryStore, SqliteStore};
use itd_core::{ListParams, QueryEngine};

use common::{draft, fixture_drafts, seed, NOW};

#[test]
fn data_survives_reopening_the_database_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("itd.sqlite");

    let created = {
        let engine = QueryEngine::new(SqliteStore::open(&path).expect("open"));
        engine
            .create_incident(
                &Actor::user(3),
                NewIncident {
                    title: "Monitor flickers".to_string(),
                    description: "Only on the left display".to_string(),
                    category: IncidentCategory::Hardware,
                    priority: IncidentPriority::Low,
                },
                NOW,
            )
            .unwrap()
    };

    let reopened = SqliteStore::open(&path).expect("reopen");
    assert_eq!(reopened.get_incident(created.id).unwrap(), Some(created));
}

#[test]
fn stores_agree_on_queries_and_counts() {
    let memory = MemoryStore::new();
    let sqlite = SqliteStore::open_in_memory().unwrap();
    seed(&memory, fixture_drafts());
    seed(&sqlite, fixture_drafts());

    let predicates = vec![
        Predicate::All,
        Predicate::ReporterIs(1),
        Predicate::text_contains("LAPTOP"),
        Predicate::StatusIn(vec![IncidentStatus::Open, IncidentStatus::Solved])
            .and(Predicate::PriorityIn(vec![IncidentPriority::High])),
        Predicate::Or(vec![
            Predicate::ResolverIs(11),
            Predicate::And(vec![
                Predicate::ResolverIsNull,
                Predicate::CategoryIn(vec![IncidentCategory::Security]),
            ]),
        ]),
        Predicate::CreatedBetween {
            from: datetime!(2025-01-15 0:00 UTC),
            to: datetime!(2025-01-15 23:59:59.999_999_999 UTC),
        },
        Predicate::CreatedSince(datetime!(2025-01-01 0:00 UTC)),
        Predicate::CategoryIn(Vec::new()),
        Predicate::Or(Vec::new()),
    ];
    let sorts = [
        SortSpec::default(),
        SortSpec::new(SortKey::Priority, SortDirection::Asc),
        SortSpec::new(SortKey::Priority, SortDirection::Desc),
        SortSpec::new(SortKey::Status, SortDirection::Desc),
    ];

    for predicate in &predicates {
        for sort in &sorts {
            for (offset, limit) in [(0, 100), (2, 3), (50, 10)] {
                assert_eq!(
                    memory.query_incidents(predicate, sort, offset, limit).unwrap(),
                    sqlite.query_incidents(predicate, sort, offset, limit).unwrap(),
                    "{predicate:?} {sort:?} {offset}/{limit}"
                );
            }
        }
        for group_by in [GroupBy::Total, GroupBy::Status, GroupBy::Category, GroupBy::DayAndStatus] {
            assert_eq!(
                memory.count_incidents(predicate, group_by).unwrap(),
                sqlite.count_incidents(predicate, group_by).unwrap(),
                "{predicate:?} {group_by:?}"
            );
        }
    }
}

#[test]
fn engine_results_match_across_stores() {
    let memory: Arc<dyn IncidentStore> = Arc::new(MemoryStore::new());
    let sqlite: Arc<dyn IncidentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed(memory.as_ref(), fixture_drafts());
    seed(sqlite.as_ref(), fixture_drafts());
    let memory = QueryEngine::from_shared(memory);
    let sqlite = QueryEngine::from_shared(sqlite);

    let params = ListParams {
        filters: ListFilters {
            category: vec!["network".to_string(), "security".to_string()],
            start_date: Some("2025-01-11".to_string()),
            ..ListFilters::default()
        },
        sort_by: Some("priority".to_string()),
        page_size: Some(3),
        page: Some(1),
        ..ListParams::default()
    };
    for actor in [
        Actor::system_admin(1),
        Actor::sector_admin(11, IncidentCategory::Security),
        Actor::user(2),
    ] {
        assert_eq!(
            memory.list(&actor, &params).unwrap(),
            sqlite.list(&actor, &params).unwrap(),
            "{actor:?}"
        );
    }
}

#[test]
fn concurrent_resolvers_cannot_both_claim_an_incident() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("race.sqlite");
    let engine = Arc::new(QueryEngine::new(SqliteStore::open(&path).unwrap()));

    let created = engine
        .create_incident(
            &Actor::user(5),
            NewIncident {
                title: "Core router down".to_string(),
                description: "All floors offline".to_string(),
                category: IncidentCategory::Network,
                priority: IncidentPriority::Critical,
            },
            NOW,
        )
        .unwrap();
    engine
        .transition_status(&Actor::system_admin(1), created.id, IncidentStatus::InProgress, NOW)
        .unwrap();

    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let id = created.id;
            thread::spawn(move || {
                let admin = Actor::system_admin(100 + i as i64);
                barrier.wait();
                engine.transition_status(&admin, id, IncidentStatus::Solved, NOW)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.code == INVALID_TRANSITION));

    let stored = engine.get_incident(&Actor::system_admin(1), created.id).unwrap();
    assert_eq!(stored.resolver_id, winners[0].resolver_id);
    assert_eq!(stored.status, IncidentStatus::Solved);
}

#[test]
fn search_folds_non_ascii_case_in_both_stores() {
    let memory: Arc<dyn IncidentStore> = Arc::new(MemoryStore::new());
    let sqlite: Arc<dyn IncidentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    for store in [&memory, &sqlite] {
        seed(store.as_ref(), fixture_drafts());
        seed(
            store.as_ref(),
            vec![draft(
                "Ärger mit Drucker",
                IncidentCategory::Hardware,
                IncidentStatus::Open,
                IncidentPriority::Low,
                NOW,
                4,
                None,
            )],
        );
    }

    for (name, store) in [("memory", memory), ("sqlite", sqlite)] {
        let engine = QueryEngine::from_shared(store);
        for needle in ["Ärger", "ÄRGER", "ärger", "DRUCKER"] {
            let params = ListParams {
                filters: ListFilters {
                    search: Some(needle.to_string()),
                    ..ListFilters::default()
                },
                ..ListParams::default()
            };
            let page = engine.list(&Actor::system_admin(1), &params).unwrap();
            let titles: Vec<&str> = page.items.iter().map(|i| i.title.as_str()).collect();
            assert_eq!(titles, vec!["Ärger mit Drucker"], "{name} {needle}");
        }
    }
}
