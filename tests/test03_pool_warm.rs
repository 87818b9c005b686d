#![cfg(feature = "sqlite")]

use std::time::Duration;

use sql_toolkit::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn warm_fills_to_max_keep_once() -> Result<(), SqlToolkitError> {
    let engine =
        Engine::new(EngineConfig::sqlite(unique_db_path("warm")).with_pool(6, 3)).await?;
    assert_eq!(engine.connection_count(), 0);

    assert_eq!(engine.warm(None).await?, 3);
    assert_eq!(engine.connection_count(), 3);
    assert_eq!(engine.idle_count(), 3);

    // Already warm: nothing to do, even when asked for more than max_keep.
    assert_eq!(engine.warm(None).await?, 0);
    assert_eq!(engine.warm(Some(10)).await?, 0);
    assert_eq!(engine.connection_count(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn warm_honours_a_smaller_target() -> Result<(), SqlToolkitError> {
    let engine =
        Engine::new(EngineConfig::sqlite(unique_db_path("warm_target")).with_pool(6, 4)).await?;
    assert_eq!(engine.warm(Some(2)).await?, 2);
    assert_eq!(engine.idle_count(), 2);
    assert_eq!(engine.warm(Some(4)).await?, 4);
    assert_eq!(engine.idle_count(), 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn idle_connections_never_exceed_max_keep() -> Result<(), SqlToolkitError> {
    let engine =
        Engine::new(EngineConfig::sqlite(unique_db_path("max_keep")).with_pool(6, 3)).await?;

    let mut handles: Vec<Connection> = (0..5).map(|_| engine.connect(false)).collect();
    for handle in &mut handles {
        handle.acquire().await?;
    }
    assert_eq!(engine.connection_count(), 5);
    assert_eq!(engine.idle_count(), 0);

    for handle in &mut handles {
        handle.close().await?;
        assert!(engine.idle_count() <= 3);
    }
    assert_eq!(engine.idle_count(), 3);
    assert_eq!(engine.connection_count(), 3);

    for _ in 0..20 {
        engine.execute("SELECT 1").await?;
    }
    assert!(engine.idle_count() <= 3);
    assert_eq!(engine.pool_status().in_use(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checkout_times_out_when_pool_is_exhausted() -> Result<(), SqlToolkitError> {
    let engine = Engine::new(
        EngineConfig::sqlite(unique_db_path("timeout"))
            .with_pool(1, 1)
            .with_pool_timeout(0.2),
    )
    .await?;

    let mut held = engine.connect(false);
    held.acquire().await?;

    let err = engine.execute("SELECT 1").await.unwrap_err();
    assert!(
        matches!(err, SqlToolkitError::PoolTimeout(wait) if wait == Duration::from_millis(200)),
        "{err}"
    );

    held.close().await?;
    engine.execute("SELECT 1").await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_timing_excludes_pool_wait() -> Result<(), SqlToolkitError> {
    let engine =
        Engine::new(EngineConfig::sqlite(unique_db_path("report_wait")).with_pool(1, 1)).await?;

    let mut held = engine.connect(false);
    held.acquire().await?;

    let waiting = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.execute_reported("SELECT 1").await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    held.close().await?;

    let (result, report) = waiting
        .await
        .map_err(|e| SqlToolkitError::Other(e.to_string()))??;
    assert_eq!(result.scalar(), Some(&RowValues::Int(1)));
    assert!(
        report.elapsed < Duration::from_millis(300),
        "elapsed {:?} includes the checkout wait",
        report.elapsed
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_pool_bounds_are_rejected_before_connecting() {
    let err = Engine::new(EngineConfig::sqlite(unique_db_path("bad_keep")).with_pool(2, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlToolkitError::ConfigError(_)), "{err}");
    assert!(err.is_construction_error());

    let err = Engine::new(EngineConfig::sqlite(unique_db_path("bad_size")).with_pool(0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlToolkitError::ConfigError(_)), "{err}");

    let err = Engine::new(
        EngineConfig::sqlite(unique_db_path("bad_query")).with_query("journal", "wal"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SqlToolkitError::ConfigError(_)), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disposed_engine_refuses_checkouts() -> Result<(), SqlToolkitError> {
    let engine =
        Engine::new(EngineConfig::sqlite(unique_db_path("dispose")).with_pool(4, 2)).await?;
    engine.warm(None).await?;
    assert_eq!(engine.idle_count(), 2);

    let mut held = engine.connect(false);
    held.acquire().await?;

    engine.dispose().await;
    assert_eq!(engine.idle_count(), 0);

    let err = engine.execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, SqlToolkitError::ConnectionError(_)), "{err}");

    // Connections checked out before disposal are dropped when returned.
    held.close().await?;
    assert_eq!(engine.connection_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clones_share_one_pool() -> Result<(), SqlToolkitError> {
    let engine =
        Engine::new(EngineConfig::sqlite(unique_db_path("clones")).with_pool(4, 2)).await?;
    let other = engine.clone();
    engine.warm(None).await?;
    assert_eq!(other.idle_count(), 2);
    assert_eq!(other.config().max_overflow(), 2);
    assert_eq!(other.database_type(), DatabaseType::Sqlite);
    Ok(())
}
