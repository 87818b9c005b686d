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

async fn engine_with_table(prefix: &str) -> Result<Engine, SqlToolkitError> {
    let engine = Engine::new(EngineConfig::sqlite(unique_db_path(prefix))).await?;
    engine
        .execute(
            "CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY, \"key\" TEXT, \"note\" TEXT, \"tags\" TEXT)",
        )
        .await?;
    Ok(engine)
}

fn texts(result: &ResultSet, column: &str) -> Vec<Option<String>> {
    result
        .column(column)
        .unwrap_or_default()
        .into_iter()
        .map(|value| value.as_text().map(str::to_string))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn insert_then_select_in_order() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("insert_select").await?;
    let inserted = engine
        .insert(Insert::into("t").rows([bind_row! { "key" => "a" }, bind_row! { "key" => "b" }]))
        .await?;
    assert_eq!(inserted.rows_affected, 2);

    let rows = engine.select(Select::from("t").order("\"id\"")).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(texts(&rows, "key"), vec![Some("a".into()), Some("b".into())]);
    assert_eq!(rows.results[0].get("id"), Some(&RowValues::Int(1)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_with_expanding_list() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("delete_in").await?;
    engine
        .insert(Insert::into("t").rows((1..=3_i64).map(|id| bind_row! { "id" => id })))
        .await?;

    let deleted = engine
        .delete(Delete::from("t").filter("\"id\" IN :ids").bind("ids", vec![1_i64, 2]))
        .await?;
    assert_eq!(deleted.rows_affected, 2);

    let left = engine.select("t").await?;
    assert_eq!(left.len(), 1);
    assert_eq!(left.scalar(), Some(&RowValues::Int(3)));

    let none = engine
        .delete(Delete::from("t").filter("\"id\" IN :ids").bind("ids", Vec::<i64>::new()))
        .await?;
    assert_eq!(none.rows_affected, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn json_array_expands_into_in_list() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("delete_json_in").await?;
    engine
        .insert(Insert::into("t").rows((1..=3_i64).map(|id| bind_row! { "id" => id })))
        .await?;

    let deleted = engine
        .delete(
            Delete::from("t")
                .filter("\"id\" IN :ids")
                .bind("ids", serde_json::json!([1, 2])),
        )
        .await?;
    assert_eq!(deleted.rows_affected, 2);
    assert_eq!(engine.count("t").await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn escaped_colon_in_string_literal_is_unescaped() -> Result<(), SqlToolkitError> {
    let engine = Engine::new(EngineConfig::sqlite(unique_db_path("escaped_colon"))).await?;
    let result = engine.execute(r"SELECT '10\:30' AS t").await?;
    assert_eq!(result.scalar(), Some(&RowValues::Text("10:30".into())));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn update_keys_on_first_column() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("update").await?;
    engine
        .insert(Insert::into("t").rows([
            bind_row! { "id" => 1_i64, "key" => "a" },
            bind_row! { "id" => 2_i64, "key" => "b" },
        ]))
        .await?;

    let updated = engine
        .update(Update::table("t").row(bind_row! { "id" => 1_i64, "key" => "z", "note" => "n" }))
        .await?;
    assert_eq!(updated.rows_affected, 1);

    let rows = engine.select(Select::from("t").order("\"id\"")).await?;
    assert_eq!(texts(&rows, "key"), vec![Some("z".into()), Some("b".into())]);
    assert_eq!(texts(&rows, "note"), vec![Some("n".into()), None]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn upsert_variants() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("upsert").await?;
    engine
        .insert(Insert::into("t").row(bind_row! { "id" => 1_i64, "key" => "a", "note" => "n" }))
        .await?;

    let ignored = engine
        .insert(
            Insert::into("t")
                .row(bind_row! { "id" => 1_i64, "key" => "b" })
                .on_conflict(["id"]),
        )
        .await?;
    assert_eq!(ignored.rows_affected, 0);

    engine
        .insert(
            Insert::into("t")
                .row(bind_row! { "id" => 1_i64, "key" => "c", "note" => "m" })
                .on_conflict(["id"])
                .conflict_action(ConflictAction::columns(["note"])),
        )
        .await?;
    let row = engine.select("t").await?;
    assert_eq!(texts(&row, "key"), vec![Some("a".into())]);
    assert_eq!(texts(&row, "note"), vec![Some("m".into())]);

    engine
        .insert(
            Insert::into("t")
                .row(bind_row! { "id" => 1_i64, "key" => "d", "note" => "o" })
                .on_conflict(["id"])
                .conflict_action(ConflictAction::UpdateAll),
        )
        .await?;
    let row = engine.select("t").await?;
    assert_eq!(texts(&row, "key"), vec![Some("d".into())]);
    assert_eq!(texts(&row, "note"), vec![Some("o".into())]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn count_exist_and_copy() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("count_copy").await?;
    engine
        .insert(Insert::into("t").rows([
            bind_row! { "key" => "a", "note" => "x" },
            bind_row! { "key" => "a", "note" => "y" },
            bind_row! { "key" => "b", "note" => "z" },
        ]))
        .await?;

    let a = Select::from("t").filter("\"key\" = :key").bind("key", "a");
    assert_eq!(engine.count(a.clone()).await?, 2);
    assert!(engine.exist(a).await?);
    assert!(
        !engine
            .exist(Select::from("t").filter("\"key\" = :key").bind("key", "missing"))
            .await?
    );

    let copied = engine
        .copy(
            CopyRows::from("t")
                .columns(["key", "note"])
                .filter("\"key\" = :key")
                .bind("key", "b"),
        )
        .await?;
    assert_eq!(copied.rows_affected, 1);
    assert_eq!(engine.count("t").await?, 4);
    assert_eq!(
        engine
            .count(Select::from("t").filter("\"note\" = 'z'"))
            .await?,
        2
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn raw_binds_and_returning() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("raw_returning").await?;
    let returned = engine
        .insert(
            Insert::into("t")
                .row(bind_row! { "key" => "a" })
                .bind("note", BindValue::raw("upper('x')"))
                .returning(["id", "note"]),
        )
        .await?;
    assert_eq!(returned.len(), 1);
    assert_eq!(returned.results[0].get("id"), Some(&RowValues::Int(1)));
    assert_eq!(returned.results[0].get("note"), Some(&RowValues::Text("X".into())));

    let counted = engine
        .select(Select::from("t").fields([":count(*) AS n"]))
        .await?;
    assert_eq!(counted.scalar(), Some(&RowValues::Int(1)));

    let literal = engine
        .select(
            Select::from("t")
                .fields(["key"])
                .filter("\"key\" = :key")
                .bind("key", BindValue::literal("a")),
        )
        .await?;
    assert_eq!(literal.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn values_are_normalized_before_binding() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("normalize").await?;
    engine
        .insert(Insert::into("t").row(bind_row! {
            "id" => 9_i64,
            "key" => "",
            "tags" => vec!["a", "b"],
        }))
        .await?;

    let row = engine.select("t").await?;
    assert_eq!(row.results[0].get("key"), Some(&RowValues::Null));
    assert_eq!(
        row.results[0].get("tags"),
        Some(&RowValues::Text("[\"a\",\"b\"]".into()))
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multi_row_execute_and_batches() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("multi_row").await?;
    engine
        .execute(
            Execute::new("INSERT INTO \"t\" (\"id\", \"key\") VALUES (:id, :key)")
                .rows([
                    bind_row! { "id" => 1_i64, "key" => "a" },
                    bind_row! { "id" => 2_i64, "key" => "b" },
                ]),
        )
        .await?;
    assert_eq!(engine.count("t").await?, 2);

    engine
        .execute("CREATE TABLE \"a\" (\"x\" INTEGER); CREATE TABLE \"b\" (\"y\" INTEGER);")
        .await?;
    assert_eq!(engine.count("a").await?, 0);
    assert_eq!(engine.count("b").await?, 0);

    let (result, report) = engine
        .execute_reported(Execute::new("SELECT \"key\" FROM \"t\" WHERE \"id\" = :id").bind("id", 2_i64))
        .await?;
    assert_eq!(result.scalar(), Some(&RowValues::Text("b".into())));
    assert_eq!(report.row_count, 1);
    assert!(report.sql.contains("WHERE \"id\" = :id"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn construction_and_parameter_errors() -> Result<(), SqlToolkitError> {
    let engine = engine_with_table("errors").await?;

    let err = engine.insert(Insert::into("t")).await.unwrap_err();
    assert!(err.is_construction_error(), "{err}");

    let err = engine
        .update(Update::table("t").row(bind_row! { "id" => 1_i64 }))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlToolkitError::BuildError(_)));

    let err = engine.execute("SELECT :missing").await.unwrap_err();
    assert!(matches!(err, SqlToolkitError::ParameterError(_)), "{err}");

    let err = engine.execute("SELEC nonsense").await.unwrap_err();
    assert!(matches!(err, SqlToolkitError::SqliteError(_)), "{err}");

    // Failed autocommit calls give their connection back.
    assert_eq!(engine.pool_status().in_use(), 0);
    Ok(())
}
