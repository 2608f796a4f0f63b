//! Tests for the table manager and schema reconciliation

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tabula_config::{SchemaConfig, TimestampColumnType, Uint64Type};
use tabula_store::{MemoryStore, Store, StoreError, sqlstate};

use super::*;
use crate::column::ColumnRole;
use crate::metric::Metric;
use crate::reconcile::TAG_COMMENT;
use crate::source::derive_table_sources;
use crate::template::Template;
use crate::types::SqlType;
use crate::SchemaError;

fn manager(config: SchemaConfig) -> TableManager {
    TableManager::new(SchemaOptions::from_config(&config).unwrap())
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn metric(name: &str, tags: &[(&str, &str)], fields: &[(&str, i64)]) -> Metric {
    let mut m = Metric::new(name, ts(1));
    for (k, v) in tags {
        m = m.with_tag(*k, *v);
    }
    for (k, v) in fields {
        m = m.with_field(*k, *v);
    }
    m
}

fn source(manager: &TableManager, metrics: Vec<Metric>) -> TableSource {
    let name = metrics[0].name.clone();
    derive_table_sources(manager.options(), metrics)
        .remove(&name)
        .unwrap()
}

fn time() -> Column {
    Column::new("time", ColumnRole::Time, SqlType::Timestamp)
}

fn statements_starting_with(store: &MemoryStore, prefix: &str) -> usize {
    store
        .executed()
        .iter()
        .filter(|s| s.starts_with(prefix))
        .count()
}

async fn ensure(
    manager: &TableManager,
    store: &MemoryStore,
    table: &str,
    required: &[Column],
) -> crate::Result<Vec<Column>> {
    let state = manager.table(table).await;
    let options = manager.options();
    manager
        .ensure_structure(
            store,
            &state,
            required,
            &options.create_templates,
            &options.add_column_templates,
            table,
            None,
        )
        .await
}

// =============================================================================
// ensure_structure
// =============================================================================

#[tokio::test]
async fn test_ensure_structure_creates_table() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let required = vec![
        Column::field("a", SqlType::BigInt),
        Column::tag("host"),
        time(),
    ];

    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert!(missing.is_empty());

    assert_eq!(
        store.executed(),
        vec![r#"CREATE TABLE "cpu" ("time" timestamp without time zone, "host" text, "a" bigint)"#]
    );

    let columns = store.table("", "cpu").unwrap();
    assert_eq!(columns[1].comment.as_deref(), Some(TAG_COMMENT));
    assert!(columns[2].comment.is_none());

    let cached = manager.cache().snapshot("cpu").await.unwrap();
    assert_eq!(cached.len(), 3);
    assert_eq!(cached.column("host").unwrap().role, ColumnRole::Tag);
}

#[tokio::test]
async fn test_ensure_structure_is_idempotent() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let required = vec![time(), Column::field("a", SqlType::BigInt)];

    ensure(&manager, &store, "cpu", &required).await.unwrap();
    let statements = store.executed().len();
    let queries = store.structure_queries();

    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert!(missing.is_empty());
    assert_eq!(store.executed().len(), statements);
    assert_eq!(store.structure_queries(), queries);
}

#[tokio::test]
async fn test_ensure_structure_widens_then_respects_disabled_alters() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let base = vec![time(), Column::tag("host"), Column::field("a", SqlType::BigInt)];
    let mut wider = base.clone();
    wider.push(Column::field("b", SqlType::Text));

    ensure(&manager, &store, "events", &base).await.unwrap();
    let missing = ensure(&manager, &store, "events", &wider).await.unwrap();
    assert!(missing.is_empty());
    assert_eq!(
        store.executed().last().unwrap(),
        r#"ALTER TABLE "events" ADD COLUMN "b" text"#
    );
    assert_eq!(manager.cache().snapshot("events").await.unwrap().len(), 4);

    // same shape against a second table, with alters disabled
    ensure(&manager, &store, "events2", &base).await.unwrap();
    let statements = store.executed().len();

    let state = manager.table("events2").await;
    let missing = manager
        .ensure_structure(
            &store,
            &state,
            &wider,
            &manager.options().create_templates,
            &[],
            "events2",
            None,
        )
        .await
        .unwrap();

    assert_eq!(missing, vec![Column::field("b", SqlType::Text)]);
    assert_eq!(store.executed().len(), statements);
    assert_eq!(manager.cache().snapshot("events2").await.unwrap().len(), 3);
    assert_eq!(store.table("", "events2").unwrap().len(), 3);
}

#[tokio::test]
async fn test_ensure_structure_permanent_alter_failure() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let base = vec![time(), Column::field("a", SqlType::BigInt)];
    let mut wider = base.clone();
    wider.push(Column::field("b", SqlType::BigInt));

    ensure(&manager, &store, "cpu", &base).await.unwrap();

    let bad = vec![Template::parse("bad").unwrap()];
    let state = manager.table("cpu").await;
    let missing = manager
        .ensure_structure(&store, &state, &wider, &[], &bad, "cpu", None)
        .await
        .unwrap();

    assert_eq!(missing, vec![Column::field("b", SqlType::BigInt)]);
    assert_eq!(store.table("", "cpu").unwrap().len(), 2);
    // the failed alter invalidated the entry
    assert!(!manager.cache().snapshot("cpu").await.unwrap().is_known());
}

#[tokio::test]
async fn test_ensure_structure_table_name_too_long() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    // 32 two-byte characters = 64 bytes
    let name = "ă".repeat(32);

    let err = ensure(&manager, &store, &name, &[time(), Column::field("foo", SqlType::BigInt)])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("table name too long"));
    assert!(!err.is_temporary());
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_ensure_structure_field_name_too_long() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let long = Column::field("ă".repeat(32), SqlType::BigInt);
    let required = vec![time(), Column::field("foo", SqlType::BigInt), long.clone()];

    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();

    assert_eq!(missing, vec![long]);
    let names: Vec<_> = store
        .table("", "cpu")
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["time", "foo"]);
}

#[tokio::test]
async fn test_ensure_structure_tag_name_too_long() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let long = Column::tag("ă".repeat(32));
    let required = vec![time(), long.clone(), Column::field("foo", SqlType::BigInt)];

    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert_eq!(missing, vec![long]);
}

#[tokio::test]
async fn test_ensure_structure_type_conflict() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    store.insert_table("", "cpu", &[("time", "timestamp"), ("a", "text"), ("n", "numeric")]);

    let required = vec![
        time(),
        Column::field("a", SqlType::BigInt),
        Column::field("n", SqlType::BigInt),
    ];
    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();

    // numeric holds bigint; text does not
    assert_eq!(missing, vec![Column::field("a", SqlType::BigInt)]);
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_ensure_structure_role_conflict() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    // "host" exists without the tag comment, so it is a field
    store.insert_table("", "cpu", &[("time", "timestamp"), ("host", "text")]);

    let missing = ensure(&manager, &store, "cpu", &[time(), Column::tag("host")])
        .await
        .unwrap();
    assert_eq!(missing, vec![Column::tag("host")]);
}

#[tokio::test]
async fn test_ensure_structure_recovers_roles_from_store() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    store.insert_table(
        "",
        "cpu",
        &[("time", "timestamp with time zone"), ("host", "text"), ("v", "float8")],
    );
    store.comment_column("", "cpu", "host", "tag").await.unwrap();

    let required = vec![
        time(),
        Column::tag("host"),
        Column::field("v", SqlType::DoublePrecision),
    ];
    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert!(missing.is_empty());

    let cached = manager.cache().snapshot("cpu").await.unwrap();
    assert_eq!(cached.column("time").unwrap().role, ColumnRole::Time);
    assert_eq!(cached.column("time").unwrap().data_type, SqlType::TimestampTz);
    assert_eq!(cached.column("host").unwrap().role, ColumnRole::Tag);
    assert_eq!(cached.column("v").unwrap().role, ColumnRole::Field);
}

#[tokio::test]
async fn test_cache_matches_store_after_clear() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let required = vec![
        time(),
        Column::tag("host"),
        Column::field("a", SqlType::BigInt),
        Column::field("b", SqlType::DoublePrecision),
    ];

    ensure(&manager, &store, "cpu", &required).await.unwrap();
    let before = manager.cache().snapshot("cpu").await.unwrap();

    manager.clear_table_cache().await;
    assert!(!manager.cache().snapshot("cpu").await.unwrap().is_known());

    let queries = store.structure_queries();
    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert!(missing.is_empty());
    assert_eq!(store.structure_queries(), queries + 1);

    let after = manager.cache().snapshot("cpu").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_ensure_structure_offline_is_temporary() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    store.set_offline(true);

    let err = ensure(&manager, &store, "cpu", &[time()]).await.unwrap_err();
    assert!(err.is_temporary());
    assert!(!manager.cache().snapshot("cpu").await.unwrap().is_known());
}

#[tokio::test]
async fn test_ensure_structure_temporary_create_failure_then_retry() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    store.fail_next(StoreError::database(sqlstate::DEADLOCK_DETECTED, "deadlock detected"));

    let required = vec![time(), Column::field("a", SqlType::BigInt)];
    let err = ensure(&manager, &store, "cpu", &required).await.unwrap_err();
    assert!(err.is_temporary());
    assert!(!manager.cache().snapshot("cpu").await.unwrap().is_known());

    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert!(missing.is_empty());
    assert!(store.table("", "cpu").is_some());
}

#[tokio::test]
async fn test_ensure_structure_lost_create_race() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let required = vec![
        time(),
        Column::field("a", SqlType::BigInt),
        Column::field("b", SqlType::BigInt),
    ];

    // another writer creates the table between our read and our CREATE
    store.concurrent_write("", "cpu", &[("time", "timestamp"), ("a", "bigint")]);
    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert!(missing.is_empty());

    // the CREATE lost; the column the winner lacked was added instead
    assert_eq!(
        store.executed(),
        vec![r#"ALTER TABLE "cpu" ADD COLUMN "b" bigint"#]
    );
    assert_eq!(manager.cache().snapshot("cpu").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_ensure_structure_lost_alter_race() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    ensure(&manager, &store, "cpu", &[time()]).await.unwrap();

    store.concurrent_write("", "cpu", &[("time", "timestamp"), ("a", "bigint")]);
    let required = vec![time(), Column::field("a", SqlType::BigInt)];
    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();

    assert!(missing.is_empty());
    let cached = manager.cache().snapshot("cpu").await.unwrap();
    assert_eq!(cached.column("a").unwrap().data_type, SqlType::BigInt);
}

#[tokio::test]
async fn test_ensure_structure_lost_alter_race_incompatible() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    ensure(&manager, &store, "cpu", &[time()]).await.unwrap();

    store.concurrent_write("", "cpu", &[("time", "timestamp"), ("a", "text")]);
    let required = vec![time(), Column::field("a", SqlType::BigInt)];
    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();

    assert_eq!(missing, vec![Column::field("a", SqlType::BigInt)]);
}

#[tokio::test]
async fn test_ensure_structure_duplicate_name_in_create_is_permanent() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let required = vec![time(), Column::tag("x"), Column::field("x", SqlType::BigInt)];

    // the store rejects the statement itself; re-reading shows no table
    let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
    assert_eq!(missing.len(), 3);
    assert!(store.table("", "cpu").is_none());
    assert!(!manager.cache().snapshot("cpu").await.unwrap().is_known());
}

#[tokio::test]
async fn test_ensure_structure_unaddable_columns_skip_the_store() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let long = Column::field("ă".repeat(32), SqlType::BigInt);
    let required = vec![time(), Column::field("a", SqlType::BigInt), long.clone()];

    ensure(&manager, &store, "cpu", &required).await.unwrap();
    let queries = store.structure_queries();

    for _ in 0..5 {
        let missing = ensure(&manager, &store, "cpu", &required).await.unwrap();
        assert_eq!(missing, vec![long.clone()]);
    }
    assert_eq!(store.structure_queries(), queries);
}

#[tokio::test]
async fn test_ensure_structure_disabled_alters_skip_the_store() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let base = vec![time(), Column::field("a", SqlType::BigInt)];
    let mut wider = base.clone();
    wider.push(Column::field("b", SqlType::BigInt));

    ensure(&manager, &store, "cpu", &base).await.unwrap();
    let queries = store.structure_queries();

    let state = manager.table("cpu").await;
    for _ in 0..3 {
        let missing = manager
            .ensure_structure(&store, &state, &wider, &[], &[], "cpu", None)
            .await
            .unwrap();
        assert_eq!(missing, vec![Column::field("b", SqlType::BigInt)]);
    }
    assert_eq!(store.structure_queries(), queries);
}

#[tokio::test]
async fn test_ensure_structure_temporary_alter_keeps_progress() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    ensure(&manager, &store, "cpu", &[time()]).await.unwrap();

    store.fail_statements_containing(
        r#""b""#,
        StoreError::connection("connection reset"),
    );
    let required = vec![
        time(),
        Column::field("a", SqlType::BigInt),
        Column::field("b", SqlType::BigInt),
    ];
    let err = ensure(&manager, &store, "cpu", &required).await.unwrap_err();
    assert!(err.is_temporary());

    let cached = manager.cache().snapshot("cpu").await.unwrap();
    assert!(cached.column("a").is_some());
    assert!(cached.column("b").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ensure_structure_timeout_is_temporary() {
    let options = SchemaOptions::from_config(&SchemaConfig::default())
        .unwrap()
        .with_statement_timeout(Duration::from_secs(1));
    let manager = TableManager::new(options);
    let store = MemoryStore::new().with_latency(Duration::from_secs(60));

    let err = ensure(&manager, &store, "cpu", &[time()]).await.unwrap_err();
    assert!(matches!(err, SchemaError::Store(StoreError::Timeout(_))));
    assert!(err.is_temporary());
}

// =============================================================================
// match_source
// =============================================================================

#[tokio::test]
async fn test_match_source_creates_metric_table() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);

    let outcome = manager.match_source(&store, &mut src).await.unwrap();
    assert!(outcome.is_complete());

    let columns = store.table("", "cpu").unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["time", "tag", "a"]);
    assert_eq!(columns[1].comment.as_deref(), Some(TAG_COMMENT));
}

#[tokio::test]
async fn test_match_source_foreign_keys() {
    let manager = manager(SchemaConfig {
        tags_as_foreign_keys: true,
        ..Default::default()
    });
    let store = MemoryStore::new();
    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);

    let outcome = manager.match_source(&store, &mut src).await.unwrap();
    assert!(outcome.is_complete());

    assert_eq!(
        store.executed(),
        vec![
            r#"CREATE TABLE "cpu_tag" ("tag_id" bigint, "tag" text, PRIMARY KEY ("tag_id"))"#,
            r#"CREATE TABLE "cpu" ("time" timestamp without time zone, "tag_id" bigint, "a" bigint)"#,
        ]
    );
    assert_eq!(src.tag_table().rows().len(), 1);
}

#[tokio::test]
async fn test_match_source_without_create_templates() {
    let manager = manager(SchemaConfig {
        create_templates: vec![],
        ..Default::default()
    });
    let store = MemoryStore::new();
    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);

    let err = manager.match_source(&store, &mut src).await.unwrap_err();
    assert!(matches!(err, SchemaError::CriticalColumn(_)));
    assert!(store.executed().is_empty());
}

#[tokio::test]
async fn test_match_source_without_tag_table_create_templates() {
    let manager = manager(SchemaConfig {
        tags_as_foreign_keys: true,
        tag_table_create_templates: vec![],
        ..Default::default()
    });
    let store = MemoryStore::new();
    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);

    assert!(manager.match_source(&store, &mut src).await.is_err());
}

#[tokio::test]
async fn test_match_source_table_name_too_long() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let mut src = source(&manager, vec![metric(&"ă".repeat(32), &[], &[("a", 1)])]);

    let err = manager.match_source(&store, &mut src).await.unwrap_err();
    assert!(matches!(err, SchemaError::TableNameTooLong { bytes: 64, .. }));
}

#[tokio::test]
async fn test_match_source_tag_and_field_share_a_name() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let mut src = source(
        &manager,
        vec![
            metric("cpu", &[("x", "a")], &[("v", 1)]),
            metric("cpu", &[], &[("x", 2), ("v", 3)]),
        ],
    );

    let outcome = manager.match_source(&store, &mut src).await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(src.record_count(), 2);

    let columns = store.table("", "cpu").unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["time", "x", "v"]);
    assert_eq!(columns[1].comment.as_deref(), Some(TAG_COMMENT));
}

#[tokio::test]
async fn test_match_source_no_alter_missing_tag() {
    let manager = manager(SchemaConfig {
        add_column_templates: vec![],
        ..Default::default()
    });
    let store = MemoryStore::new();

    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);
    manager.match_source(&store, &mut src).await.unwrap();

    let mut src = source(
        &manager,
        vec![
            metric("cpu", &[("tag", "foo")], &[("a", 2)]),
            metric("cpu", &[("tag", "foo"), ("bar", "baz")], &[("a", 3)]),
        ],
    );
    let outcome = manager.match_source(&store, &mut src).await.unwrap();

    assert_eq!(outcome.metric_table_missing, vec![Column::tag("bar")]);
    assert!(!src.column_names().contains(&"bar".to_string()));
    assert_eq!(src.rows().len(), 1);
}

#[tokio::test]
async fn test_match_source_no_alter_missing_tag_table_tag() {
    let manager = manager(SchemaConfig {
        tags_as_foreign_keys: true,
        tag_table_add_column_templates: vec![],
        ..Default::default()
    });
    let store = MemoryStore::new();

    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);
    manager.match_source(&store, &mut src).await.unwrap();

    let mut src = source(
        &manager,
        vec![
            metric("cpu", &[("tag", "foo")], &[("a", 2)]),
            metric("cpu", &[("tag", "foo"), ("bar", "baz")], &[("a", 3)]),
        ],
    );
    let outcome = manager.match_source(&store, &mut src).await.unwrap();

    assert_eq!(outcome.tag_table_missing, vec![Column::tag("bar")]);
    assert!(outcome.metric_table_missing.is_empty());
    assert!(!src.tag_table().column_names().contains(&"bar".to_string()));
    assert_eq!(src.rows().len(), 1);
    assert_eq!(src.tag_table().rows().len(), 1);
}

#[tokio::test]
async fn test_match_source_bad_alter_tag_table() {
    let manager = manager(SchemaConfig {
        tags_as_foreign_keys: true,
        tag_table_add_column_templates: vec!["bad".into()],
        ..Default::default()
    });
    let store = MemoryStore::new();

    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);
    manager.match_source(&store, &mut src).await.unwrap();

    let mut src = source(
        &manager,
        vec![
            metric("cpu", &[("tag", "foo")], &[("a", 2)]),
            metric("cpu", &[("tag", "foo"), ("bar", "baz")], &[("a", 3)]),
        ],
    );
    manager.match_source(&store, &mut src).await.unwrap();
    assert!(!src.tag_table().column_names().contains(&"bar".to_string()));
}

#[tokio::test]
async fn test_match_source_no_alter_missing_field() {
    let manager = manager(SchemaConfig {
        add_column_templates: vec![],
        ..Default::default()
    });
    let store = MemoryStore::new();

    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);
    manager.match_source(&store, &mut src).await.unwrap();

    let mut src = source(
        &manager,
        vec![
            metric("cpu", &[("tag", "foo")], &[("a", 2)]),
            metric("cpu", &[("tag", "foo")], &[("a", 3), ("b", 3)]),
        ],
    );
    let outcome = manager.match_source(&store, &mut src).await.unwrap();

    assert_eq!(outcome.metric_table_missing, vec![Column::field("b", SqlType::BigInt)]);
    assert!(!src.column_names().contains(&"b".to_string()));
    // field drops keep every record
    assert_eq!(src.rows().len(), 2);
}

#[tokio::test]
async fn test_match_source_bad_alter_field() {
    let manager = manager(SchemaConfig {
        add_column_templates: vec!["bad".into()],
        ..Default::default()
    });
    let store = MemoryStore::new();

    let mut src = source(&manager, vec![metric("cpu", &[("tag", "foo")], &[("a", 1)])]);
    manager.match_source(&store, &mut src).await.unwrap();

    let mut src = source(
        &manager,
        vec![
            metric("cpu", &[("tag", "foo")], &[("a", 2)]),
            metric("cpu", &[("tag", "foo")], &[("a", 3), ("b", 3)]),
        ],
    );
    manager.match_source(&store, &mut src).await.unwrap();
    assert!(!src.column_names().contains(&"b".to_string()));
}

#[tokio::test]
async fn test_match_source_comment_only_add_template() {
    let store = MemoryStore::new();

    let first = manager(SchemaConfig {
        tags_as_foreign_keys: true,
        ..Default::default()
    });
    let mut src = source(&first, vec![metric("cpu", &[("foo", "bar")], &[("a", 1)])]);
    first.match_source(&store, &mut src).await.unwrap();

    let second = manager(SchemaConfig {
        tags_as_foreign_keys: true,
        add_column_templates: vec!["-- add column: {{ columns }}".into()],
        ..Default::default()
    });
    let mut src = source(&second, vec![metric("cpu", &[("pop", "tart")], &[("a", 1), ("b", 2)])]);
    let outcome = second.match_source(&store, &mut src).await.unwrap();

    assert!(outcome.is_complete());
    assert_eq!(statements_starting_with(&store, r#"CREATE TABLE "cpu" "#), 1);
    assert!(
        store
            .executed()
            .contains(&r#"-- add column: "b" bigint"#.to_string())
    );
}

#[tokio::test]
async fn test_match_source_time_with_time_zone() {
    let manager = manager(SchemaConfig {
        namespace: "public".into(),
        tags_as_foreign_keys: true,
        timestamp_column_type: TimestampColumnType::WithTimeZone,
        ..Default::default()
    });
    let store = MemoryStore::new();
    let mut src = source(&manager, vec![metric("cpu", &[("pop", "tart")], &[("a", 1), ("b", 2)])]);

    manager.match_source(&store, &mut src).await.unwrap();

    let expected = r#"CREATE TABLE "public"."cpu" ("time" timestamp with time zone, "tag_id" bigint, "a" bigint, "b" bigint)"#;
    let count = store.executed().iter().filter(|s| *s == expected).count();
    assert_eq!(count, 1);
    assert!(store.table("public", "cpu").is_some());
}

#[tokio::test]
async fn test_match_source_unsigned_integers() {
    let manager = manager(SchemaConfig {
        uint64_type: Uint64Type::Uint8,
        ..Default::default()
    });
    let store = MemoryStore::new();
    let mut src = source(
        &manager,
        vec![Metric::new("cpu", ts(1)).with_field("n", u64::MAX)],
    );

    manager.match_source(&store, &mut src).await.unwrap();

    let columns = store.table("", "cpu").unwrap();
    assert_eq!(columns[1].data_type, "uint8");
}

#[tokio::test]
async fn test_match_source_json_columns_survive_cache_clear() {
    let manager = manager(SchemaConfig {
        tags_as_jsonb: true,
        fields_as_jsonb: true,
        ..Default::default()
    });
    let store = MemoryStore::new();
    let metrics = vec![metric("cpu", &[("host", "a")], &[("v", 1)])];

    let mut src = source(&manager, metrics.clone());
    manager.match_source(&store, &mut src).await.unwrap();

    manager.clear_table_cache().await;

    let mut src = source(&manager, metrics);
    let outcome = manager.match_source(&store, &mut src).await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(statements_starting_with(&store, "CREATE"), 1);
}

#[tokio::test]
async fn test_match_source_recreates_dropped_table_after_clear() {
    let manager = manager(SchemaConfig::default());
    let store = MemoryStore::new();
    let metrics = vec![metric("cpu", &[], &[("a", 1)])];

    let mut src = source(&manager, metrics.clone());
    manager.match_source(&store, &mut src).await.unwrap();

    store.drop_table("", "cpu");
    manager.clear_table_cache().await;

    let mut src = source(&manager, metrics);
    manager.match_source(&store, &mut src).await.unwrap();
    assert_eq!(statements_starting_with(&store, "CREATE"), 2);
    assert!(store.table("", "cpu").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_match_same_table_creates_once() {
    let manager = Arc::new(manager(SchemaConfig {
        tags_as_foreign_keys: true,
        ..Default::default()
    }));
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(5)));
    let template = source(&manager, vec![metric("cpu", &[("host", "a")], &[("a", 1)])]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let store = Arc::clone(&store);
            let mut src = template.clone();
            tokio::spawn(async move {
                let store: &dyn Store = store.as_ref();
                manager.match_source(store, &mut src).await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_complete());
    }

    assert_eq!(statements_starting_with(&store, r#"CREATE TABLE "cpu" "#), 1);
    assert_eq!(statements_starting_with(&store, r#"CREATE TABLE "cpu_tag" "#), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_match_different_tables() {
    let manager = Arc::new(manager(SchemaConfig::default()));
    let store = Arc::new(MemoryStore::new());

    let handles: Vec<_> = ["cpu", "mem", "disk", "net"]
        .into_iter()
        .map(|name| {
            let manager = Arc::clone(&manager);
            let store = Arc::clone(&store);
            let mut src = source(&manager, vec![metric(name, &[("host", "a")], &[("v", 1)])]);
            tokio::spawn(async move {
                let store: &dyn Store = store.as_ref();
                manager.match_source(store, &mut src).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(statements_starting_with(&store, "CREATE"), 4);
    assert_eq!(manager.cache().len().await, 4);
}
