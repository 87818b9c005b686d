#![cfg(feature = "sqlite")]

use sql_toolkit::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

fn engine_with_table(prefix: &str) -> Result<BlockingEngine, SqlToolkitError> {
    let engine = BlockingEngine::new(EngineConfig::sqlite(unique_db_path(prefix)).with_pool(4, 2))?;
    engine.execute("CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY, \"key\" TEXT)")?;
    Ok(engine)
}

fn insert_rows() -> Execute {
    Execute::new("INSERT INTO \"t\" (\"id\", \"key\") VALUES (:id, :key)")
}

#[test]
fn blocking_engine_runs_every_operation() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("blocking_ops")?;
    assert_eq!(engine.database_type(), DatabaseType::Sqlite);

    let inserted = engine.insert(Insert::into("t").rows([
        bind_row! { "id" => 1_i64, "key" => "a" },
        bind_row! { "id" => 2_i64, "key" => "b" },
        bind_row! { "id" => 3_i64, "key" => "c" },
    ]))?;
    assert_eq!(inserted.rows_affected, 3);

    engine.update(Update::table("t").row(bind_row! { "id" => 2_i64, "key" => "B" }))?;
    let rows = engine.select(Select::from("t").fields(["key"]).order("\"id\""))?;
    let keys: Vec<_> = rows
        .column("key")
        .unwrap_or_default()
        .into_iter()
        .filter_map(RowValues::as_text)
        .collect();
    assert_eq!(keys, vec!["a", "B", "c"]);

    let deleted = engine.delete(Delete::from("t").filter("\"id\" IN :ids").bind("ids", [1_i64, 3]))?;
    assert_eq!(deleted.rows_affected, 2);
    assert_eq!(engine.count("t")?, 1);
    assert!(engine.exist(Select::from("t").filter("\"key\" = 'B'"))?);

    engine.copy(CopyRows::from("t").columns(["key"]))?;
    assert_eq!(engine.count("t")?, 2);

    let (result, report) = engine.execute_reported("SELECT count(*) FROM \"t\"")?;
    assert_eq!(result.scalar(), Some(&RowValues::Int(2)));
    assert_eq!(report.row_count, 1);
    Ok(())
}

#[test]
fn blocking_handles_follow_the_transaction_contract() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("blocking_tx")?;

    let mut conn = engine.connect(false);
    assert_eq!(conn.state(), ConnectionState::Unallocated);
    conn.execute(insert_rows().row(bind_row! { "id" => 1_i64, "key" => "a" }))?;
    assert!(conn.in_transaction());
    conn.rollback()?;
    assert_eq!(conn.last_outcome(), Some(TxOutcome::RolledBack));
    conn.execute(insert_rows().row(bind_row! { "id" => 2_i64, "key" => "b" }))?;
    conn.commit()?;
    conn.close()?;
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(engine.count("t")?, 1);

    let counted = engine.connect(false).scoped(|conn| {
        conn.execute(insert_rows().row(bind_row! { "id" => 3_i64, "key" => "c" }))?;
        conn.count("t")
    })?;
    assert_eq!(counted, 2);

    let failed: Result<(), SqlToolkitError> = engine.connect(false).scoped(|conn| {
        conn.execute(insert_rows().row(bind_row! { "id" => 4_i64, "key" => "d" }))?;
        Err(SqlToolkitError::Other("abandon".into()))
    });
    assert!(failed.is_err());
    assert_eq!(engine.count("t")?, 2);

    // Dropping an open handle gives its connection back without committing.
    {
        let mut dropped = engine.connect(false);
        dropped.execute(insert_rows().row(bind_row! { "id" => 5_i64, "key" => "e" }))?;
    }
    assert_eq!(engine.count("t")?, 2);
    assert_eq!(engine.pool_status().in_use(), 0);
    Ok(())
}

#[test]
fn blocking_warm_uses_worker_threads() -> Result<(), SqlToolkitError> {
    let engine = BlockingEngine::new(EngineConfig::sqlite(unique_db_path("blocking_warm")).with_pool(6, 3))?;
    assert_eq!(engine.warm(None)?, 3);
    assert_eq!(engine.connection_count(), 3);
    assert_eq!(engine.idle_count(), 3);
    assert_eq!(engine.warm(None)?, 0);

    engine.dispose();
    assert_eq!(engine.idle_count(), 0);
    assert!(engine.execute("SELECT 1").is_err());
    Ok(())
}

#[test]
fn generator_iterates_lazily_and_stops_at_first_error() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("blocking_generator")?;

    let mut conn = engine.connect(false);
    let results: Vec<_> = conn
        .generator(insert_rows().rows((1..=3_i64).map(|id| bind_row! { "id" => id, "key" => "k" })))
        .collect();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(Result::is_ok));
    conn.commit()?;
    conn.close()?;
    assert_eq!(engine.count("t")?, 3);

    let mut rows = engine.generator(insert_rows().rows([
        bind_row! { "id" => 4_i64, "key" => "k" },
        bind_row! { "id" => 1_i64, "key" => "dup" },
        bind_row! { "id" => 5_i64, "key" => "k" },
    ]));
    assert!(matches!(rows.next(), Some(Ok(_))));
    assert!(matches!(rows.next(), Some(Err(_))));
    assert!(rows.next().is_none());
    drop(rows);

    // Each row commits on its own, so the row before the failure stays.
    assert_eq!(engine.count("t")?, 4);
    assert!(!engine.exist(Select::from("t").filter("\"id\" = 5"))?);
    Ok(())
}

#[test]
fn converts_between_cooperative_and_blocking() -> Result<(), SqlToolkitError> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| SqlToolkitError::Other(e.to_string()))?;
    let path = unique_db_path("convert");
    let engine = runtime.block_on(Engine::new(EngineConfig::sqlite(path)))?;
    runtime.block_on(engine.execute("CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY)"))?;

    let blocking = engine.to_blocking()?;
    blocking.insert(Insert::into("t").row(bind_row! { "id" => 1_i64 }))?;
    assert_eq!(blocking.config(), engine.config());

    let cooperative = runtime.block_on(blocking.to_cooperative())?;
    assert_eq!(runtime.block_on(cooperative.count("t"))?, 1);
    assert_eq!(runtime.block_on(engine.count("t"))?, 1);

    drop(blocking);
    Ok(())
}
