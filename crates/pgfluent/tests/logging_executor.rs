#![cfg(feature = "tracing")]

mod support;

use pgfluent::{
    Executor, FluentResult, LogConfig, LoggingExecutor, SchemaBuilder, Value, record, table,
};
use support::{Call, RecordingExecutor};
use tracing::Level;

#[tokio::test]
async fn forwards_statements_unchanged() -> FluentResult<()> {
    let conn = LoggingExecutor::new(RecordingExecutor::new())
        .with_config(LogConfig::new().level(Level::INFO).max_sql_length(8));
    conn.inner().respond(vec![record! { "id" => 1 }]);

    let rows = table("users")
        .where_eq("status", "active")?
        .fetch_all(&conn)
        .await?;
    assert_eq!(rows, vec![record! { "id" => 1 }]);

    let affected = conn.execute("DELETE FROM t WHERE id = ?", &[Value::Int(3)]).await?;
    assert_eq!(affected, 0);
    conn.batch_execute("SELECT 1; SELECT 2").await?;

    assert_eq!(
        conn.inner().calls(),
        vec![
            Call {
                kind: "query",
                sql: "SELECT * FROM \"users\" WHERE \"status\" = ?".to_string(),
                params: vec![Value::from("active")],
            },
            Call {
                kind: "execute",
                sql: "DELETE FROM t WHERE id = ?".to_string(),
                params: vec![Value::Int(3)],
            },
            Call {
                kind: "batch",
                sql: "SELECT 1; SELECT 2".to_string(),
                params: vec![],
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn schema_runs_use_the_inner_transaction() -> FluentResult<()> {
    let conn = LoggingExecutor::new(RecordingExecutor::new());
    let mut schema = SchemaBuilder::new();
    schema.raw("SELECT 1");
    schema.run(&conn).await?;

    assert_eq!(conn.into_inner().sql(), vec!["BEGIN", "SELECT 1;", "COMMIT"]);
    Ok(())
}

#[tokio::test]
async fn failures_pass_through() {
    let conn = LoggingExecutor::new(RecordingExecutor::new());
    conn.inner().fail_batches_containing("boom");

    let err = conn.batch_execute("SELECT boom").await.unwrap_err();
    assert!(err.to_string().contains("boom"));

    let mut schema = SchemaBuilder::new();
    schema.raw("SELECT boom");
    let err = schema.run(&conn).await.unwrap_err();
    assert_eq!(err.ddl_sql(), Some("SELECT boom;"));
    assert_eq!(conn.inner().sql().last().map(String::as_str), Some("ROLLBACK"));
}
