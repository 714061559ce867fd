//! Code-defined migrations applied through the schema builder.
//!
//! Each migration contributes DDL to a [`SchemaBuilder`]; the runner appends
//! the bookkeeping statement and applies both in one transaction. Migrations
//! applied together share a batch number, and [`Migrator::rollback`] reverts
//! the most recent batch.
//!
//! # Example
//!
//! ```ignore
//! use pgfluent::migrate::{Migrator, MigratorConfig, migration};
//! use std::time::Duration;
//!
//! let migrator = Migrator::new(vec![
//!     Box::new(migration(
//!         "001_create_users",
//!         |s| {
//!             s.create_table("users", |t| {
//!                 t.increments("id");
//!                 t.string("email").unique();
//!             })?;
//!             Ok(())
//!         },
//!         |s| {
//!             s.drop_table("users");
//!             Ok(())
//!         },
//!     )),
//! ])
//! .config(MigratorConfig::new().lock_timeout(Duration::from_secs(5)));
//!
//! let applied = migrator.latest(&client).await?;
//! ```

use crate::client::Executor;
use crate::error::{FluentError, FluentResult};
use crate::escape::{escape_identifier, escape_value};
use crate::schema::SchemaBuilder;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

const DEFAULT_MIGRATION_TABLE: &str = "pgfluent_migrations";

/// A named, reversible schema change.
pub trait Migration: Send + Sync {
    /// Unique name; also the history key, so it must never change once applied.
    fn name(&self) -> &str;

    fn up(&self, schema: &mut SchemaBuilder) -> FluentResult<()>;

    fn down(&self, schema: &mut SchemaBuilder) -> FluentResult<()>;
}

/// A [`Migration`] built from two closures.
pub struct FnMigration<U, D> {
    name: String,
    up: U,
    down: D,
}

impl<U, D> Migration for FnMigration<U, D>
where
    U: Fn(&mut SchemaBuilder) -> FluentResult<()> + Send + Sync,
    D: Fn(&mut SchemaBuilder) -> FluentResult<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn up(&self, schema: &mut SchemaBuilder) -> FluentResult<()> {
        (self.up)(schema)
    }

    fn down(&self, schema: &mut SchemaBuilder) -> FluentResult<()> {
        (self.down)(schema)
    }
}

pub fn migration<U, D>(name: impl Into<String>, up: U, down: D) -> FnMigration<U, D>
where
    U: Fn(&mut SchemaBuilder) -> FluentResult<()> + Send + Sync,
    D: Fn(&mut SchemaBuilder) -> FluentResult<()> + Send + Sync,
{
    FnMigration {
        name: name.into(),
        up,
        down,
    }
}

/// Runner settings.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// History table, optionally schema-qualified.
    pub table_name: String,
    /// `SET LOCAL lock_timeout` issued at the start of every migration transaction.
    pub lock_timeout: Option<Duration>,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_MIGRATION_TABLE.to_string(),
            lock_timeout: None,
        }
    }
}

impl MigratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

/// A row of the history table.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    pub id: i64,
    pub name: String,
    pub batch: i64,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    /// History rows, oldest first.
    pub applied: Vec<AppliedMigration>,
    /// Declared migrations not yet applied, in declaration order.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    pub fn last_batch(&self) -> i64 {
        self.applied.iter().map(|m| m.batch).max().unwrap_or(0)
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies and reverts an ordered list of migrations.
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
    config: MigratorConfig,
}

impl Migrator {
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        Self {
            migrations,
            config: MigratorConfig::default(),
        }
    }

    /// Append one migration to the declared list.
    pub fn add(mut self, migration: impl Migration + 'static) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }

    pub fn config(mut self, config: MigratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.migrations.iter().map(|m| m.name())
    }

    fn find(&self, name: &str) -> Option<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.name() == name)
            .map(|m| &**m)
    }

    fn table(&self) -> FluentResult<String> {
        escape_identifier(&self.config.table_name)
    }

    /// Create the history table if it does not exist.
    pub async fn ensure_table(&self, conn: &impl Executor) -> FluentResult<()> {
        let mut schema = SchemaBuilder::new();
        schema.create_table_if_not_exists(self.config.table_name.as_str(), |t| {
            t.increments("id");
            t.string("name").unique();
            t.integer("batch");
            t.timestamptz("applied_at").default_to(Value::now());
        })?;
        schema.run(conn).await
    }

    async fn fetch_applied(&self, conn: &impl Executor) -> FluentResult<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT \"id\", \"name\", \"batch\", \"applied_at\" FROM {} ORDER BY \"id\" ASC",
            self.table()?
        );
        let rows = match conn.query(&sql, &[]).await {
            Ok(rows) => rows,
            Err(err) if is_undefined_table(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        rows.into_iter()
            .map(|row| -> FluentResult<AppliedMigration> {
                Ok(AppliedMigration {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    batch: row.try_get("batch")?,
                    applied_at: row.try_get("applied_at")?,
                })
            })
            .collect()
    }

    /// Declared names must be unique, and the history must be a prefix of
    /// the declared list.
    fn validate(&self, applied: &[AppliedMigration]) -> FluentResult<()> {
        let mut seen = HashSet::new();
        for name in self.names() {
            if !seen.insert(name) {
                return Err(FluentError::migration(format!(
                    "migration '{name}' is declared more than once"
                )));
            }
        }

        let declared: Vec<&str> = self.names().collect();
        for (idx, row) in applied.iter().enumerate() {
            match declared.get(idx) {
                Some(name) if *name == row.name => {}
                Some(name) => {
                    return Err(FluentError::migration(format!(
                        "history diverges at position {}: applied '{}', declared '{name}'",
                        idx + 1,
                        row.name
                    )));
                }
                None => {
                    return Err(FluentError::migration(format!(
                        "applied migration '{}' is not declared",
                        row.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Applied vs pending migrations. Does not create the history table.
    pub async fn status(&self, conn: &impl Executor) -> FluentResult<MigrationStatus> {
        let applied = self.fetch_applied(conn).await?;
        self.validate(&applied)?;
        let pending = self
            .names()
            .skip(applied.len())
            .map(str::to_string)
            .collect();
        Ok(MigrationStatus { applied, pending })
    }

    fn begin_batch(&self) -> SchemaBuilder {
        let mut schema = SchemaBuilder::new();
        if let Some(timeout) = self.config.lock_timeout {
            schema.raw(format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis()));
        }
        schema
    }

    /// Apply every pending migration under one new batch number.
    ///
    /// Each migration commits on its own together with its history row; a
    /// failure stops the run and leaves earlier migrations applied.
    /// Returns the names applied.
    pub async fn latest(&self, conn: &impl Executor) -> FluentResult<Vec<String>> {
        self.ensure_table(conn).await?;
        let status = self.status(conn).await?;
        if status.is_up_to_date() {
            #[cfg(feature = "tracing")]
            tracing::info!(target: "pgfluent.migrate", "already up to date");
            return Ok(Vec::new());
        }

        let batch = status.last_batch() + 1;
        let table = self.table()?;
        let mut applied = Vec::with_capacity(status.pending.len());
        for name in &status.pending {
            let migration = self
                .find(name)
                .ok_or_else(|| FluentError::migration(format!("migration '{name}' not found")))?;

            let mut schema = self.begin_batch();
            migration.up(&mut schema)?;
            schema.raw(format!(
                "INSERT INTO {table} (\"name\", \"batch\") VALUES ({}, {batch})",
                escape_value(&Value::from(name.as_str()))?
            ));
            schema.run(conn).await?;

            #[cfg(feature = "tracing")]
            tracing::info!(target: "pgfluent.migrate", migration = %name, batch, "applied");
            applied.push(name.clone());
        }
        Ok(applied)
    }

    /// Revert the most recent batch, newest migration first.
    ///
    /// Returns the names reverted.
    pub async fn rollback(&self, conn: &impl Executor) -> FluentResult<Vec<String>> {
        self.ensure_table(conn).await?;
        let status = self.status(conn).await?;
        let batch = status.last_batch();
        if batch == 0 {
            #[cfg(feature = "tracing")]
            tracing::info!(target: "pgfluent.migrate", "nothing to roll back");
            return Ok(Vec::new());
        }

        let table = self.table()?;
        let mut reverted = Vec::new();
        for row in status.applied.iter().rev().filter(|m| m.batch == batch) {
            let migration = self.find(&row.name).ok_or_else(|| {
                FluentError::migration(format!("migration '{}' not found", row.name))
            })?;

            let mut schema = self.begin_batch();
            migration.down(&mut schema)?;
            schema.raw(format!(
                "DELETE FROM {table} WHERE \"name\" = {}",
                escape_value(&Value::from(row.name.as_str()))?
            ));
            schema.run(conn).await?;

            #[cfg(feature = "tracing")]
            tracing::info!(target: "pgfluent.migrate", migration = %row.name, batch, "rolled back");
            reverted.push(row.name.clone());
        }
        Ok(reverted)
    }
}

fn is_undefined_table(err: &FluentError) -> bool {
    match err {
        FluentError::Query(e) => e
            .as_db_error()
            .is_some_and(|db| db.code().code() == "42P01"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Box<dyn Migration> {
        Box::new(migration(name, |_| Ok(()), |_| Ok(())))
    }

    fn applied(id: i64, name: &str, batch: i64) -> AppliedMigration {
        AppliedMigration {
            id,
            name: name.to_string(),
            batch,
            applied_at: None,
        }
    }

    #[test]
    fn history_must_be_a_prefix() {
        let m = Migrator::new(vec![noop("a"), noop("b"), noop("c")]);
        assert!(m.validate(&[]).is_ok());
        assert!(m.validate(&[applied(1, "a", 1), applied(2, "b", 1)]).is_ok());

        let err = m.validate(&[applied(1, "b", 1)]).unwrap_err();
        assert!(err.to_string().contains("diverges at position 1"));

        let err = m
            .validate(&[
                applied(1, "a", 1),
                applied(2, "b", 1),
                applied(3, "c", 2),
                applied(4, "d", 2),
            ])
            .unwrap_err();
        assert!(err.to_string().contains("'d' is not declared"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let m = Migrator::new(vec![noop("a")]).add(migration("a", |_| Ok(()), |_| Ok(())));
        assert!(matches!(m.validate(&[]), Err(FluentError::Migration(_))));
    }

    #[test]
    fn lock_timeout_opens_each_batch() {
        let m = Migrator::new(vec![])
            .config(MigratorConfig::new().lock_timeout(Duration::from_millis(1500)));
        let schema = m.begin_batch();
        assert_eq!(
            schema.to_sql().unwrap(),
            vec!["SET LOCAL lock_timeout = '1500ms'"]
        );
        assert!(Migrator::new(vec![]).begin_batch().is_empty());
    }

    #[test]
    fn last_batch_of_empty_history_is_zero() {
        let status = MigrationStatus {
            applied: vec![],
            pending: vec!["a".into()],
        };
        assert_eq!(status.last_batch(), 0);
        assert!(!status.is_up_to_date());
    }
}
