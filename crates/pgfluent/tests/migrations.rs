mod support;

use pgfluent::migrate::{Migration, Migrator, MigratorConfig, migration};
use pgfluent::{FluentError, FluentResult, Record, Value, record};
use std::time::Duration;
use support::RecordingExecutor;

fn create(name: &'static str, table: &'static str) -> Box<dyn Migration> {
    Box::new(migration(
        name,
        move |s| {
            s.create_table(table, |t| {
                t.increments("id");
            })?;
            Ok(())
        },
        move |s| {
            s.drop_table(table);
            Ok(())
        },
    ))
}

fn migrator() -> Migrator {
    Migrator::new(vec![
        create("001_users", "users"),
        create("002_posts", "posts"),
        create("003_comments", "comments"),
    ])
}

fn history(rows: &[(i64, &str, i64)]) -> Vec<Record> {
    rows.iter()
        .map(|(id, name, batch)| {
            record! { "id" => *id, "name" => *name, "batch" => *batch, "applied_at" => Value::Null }
        })
        .collect()
}

/// Batches sent inside BEGIN/COMMIT, excluding the history table bootstrap.
fn migration_batches(conn: &RecordingExecutor) -> Vec<String> {
    conn.calls()
        .into_iter()
        .filter(|c| c.kind == "batch")
        .map(|c| c.sql)
        .filter(|sql| !matches!(sql.as_str(), "BEGIN" | "COMMIT" | "ROLLBACK"))
        .filter(|sql| !sql.starts_with("CREATE TABLE IF NOT EXISTS"))
        .collect()
}

#[tokio::test]
async fn status_reports_pending_after_applied_prefix() -> FluentResult<()> {
    let conn = RecordingExecutor::new();
    conn.respond(history(&[(1, "001_users", 1)]));

    let status = migrator().status(&conn).await?;
    assert_eq!(status.applied.len(), 1);
    assert_eq!(status.applied[0].name, "001_users");
    assert_eq!(status.pending, vec!["002_posts", "003_comments"]);
    assert_eq!(
        conn.calls()[0].sql,
        "SELECT \"id\", \"name\", \"batch\", \"applied_at\" \
         FROM \"pgfluent_migrations\" ORDER BY \"id\" ASC"
    );
    Ok(())
}

#[tokio::test]
async fn latest_applies_pending_as_next_batch() -> FluentResult<()> {
    let conn = RecordingExecutor::new();
    conn.respond(history(&[(1, "001_users", 1)]));

    let applied = migrator().latest(&conn).await?;
    assert_eq!(applied, vec!["002_posts", "003_comments"]);

    let batches = migration_batches(&conn);
    assert_eq!(
        batches,
        vec![
            "CREATE TABLE \"posts\" (\"id\" serial NOT NULL PRIMARY KEY);\n\
             INSERT INTO \"pgfluent_migrations\" (\"name\", \"batch\") VALUES ('002_posts', 2);",
            "CREATE TABLE \"comments\" (\"id\" serial NOT NULL PRIMARY KEY);\n\
             INSERT INTO \"pgfluent_migrations\" (\"name\", \"batch\") VALUES ('003_comments', 2);",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn latest_bootstraps_history_table() -> FluentResult<()> {
    let conn = RecordingExecutor::new();
    Migrator::new(vec![]).latest(&conn).await?;
    let sql = conn.sql();
    assert_eq!(sql[0], "BEGIN");
    assert_eq!(
        sql[1],
        "CREATE TABLE IF NOT EXISTS \"pgfluent_migrations\" (\"id\" serial NOT NULL PRIMARY KEY, \
         \"name\" varchar(255) NOT NULL UNIQUE, \"batch\" integer NOT NULL, \
         \"applied_at\" timestamptz NOT NULL DEFAULT now()::timestamptz);"
    );
    Ok(())
}

#[tokio::test]
async fn lock_timeout_and_custom_table() -> FluentResult<()> {
    let conn = RecordingExecutor::new();
    let migrator = Migrator::new(vec![create("001_users", "users")]).config(
        MigratorConfig::new()
            .table_name("ops.history")
            .lock_timeout(Duration::from_secs(3)),
    );
    migrator.latest(&conn).await?;

    let batch = conn
        .sql()
        .into_iter()
        .find(|sql| sql.contains("\"users\""))
        .unwrap();
    assert!(batch.starts_with("SET LOCAL lock_timeout = '3000ms';\n"));
    assert!(batch.ends_with(
        "INSERT INTO \"ops\".\"history\" (\"name\", \"batch\") VALUES ('001_users', 1);"
    ));
    Ok(())
}

#[tokio::test]
async fn rollback_reverts_last_batch_newest_first() -> FluentResult<()> {
    let conn = RecordingExecutor::new();
    conn.respond(history(&[
        (1, "001_users", 1),
        (2, "002_posts", 2),
        (3, "003_comments", 2),
    ]));

    let reverted = migrator().rollback(&conn).await?;
    assert_eq!(reverted, vec!["003_comments", "002_posts"]);
    assert_eq!(
        migration_batches(&conn),
        vec![
            "DROP TABLE \"comments\";\n\
             DELETE FROM \"pgfluent_migrations\" WHERE \"name\" = '003_comments';",
            "DROP TABLE \"posts\";\n\
             DELETE FROM \"pgfluent_migrations\" WHERE \"name\" = '002_posts';",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn rollback_with_empty_history_is_a_noop() -> FluentResult<()> {
    let conn = RecordingExecutor::new();
    assert!(migrator().rollback(&conn).await?.is_empty());
    assert!(migration_batches(&conn).is_empty());
    Ok(())
}

#[tokio::test]
async fn diverged_history_stops_before_any_migration() {
    let conn = RecordingExecutor::new();
    conn.respond(history(&[(1, "002_posts", 1)]));

    let err = migrator().latest(&conn).await.unwrap_err();
    assert!(matches!(err, FluentError::Migration(_)));
    assert!(migration_batches(&conn).is_empty());
}

#[tokio::test]
async fn failing_migration_stops_the_run() {
    let conn = RecordingExecutor::new();
    conn.fail_batches_containing("\"comments\"");

    let err = migrator().latest(&conn).await.unwrap_err();
    assert!(err.ddl_sql().is_some_and(|sql| sql.contains("003_comments")));
    assert_eq!(
        conn.sql().iter().filter(|sql| sql.as_str() == "ROLLBACK").count(),
        1
    );
    assert_eq!(
        conn.sql().iter().filter(|sql| sql.as_str() == "COMMIT").count(),
        3
    );
}
