//! Schema builder: accumulate DDL and apply it in one transaction.
//!
//! # Usage
//!
//! ```ignore
//! use pgfluent::schema::{ColumnChanges, ColumnType, SchemaBuilder};
//!
//! let mut schema = SchemaBuilder::new();
//! schema
//!     .create_table("users", |t| {
//!         t.increments("id");
//!         t.string("email").unique();
//!         t.jsonb("profile").nullable();
//!         t.timestamps();
//!     })?
//!     .alter_table("posts", |t| {
//!         t.rename_column("body", "content");
//!         t.alter_column("title", ColumnChanges::new().ty(ColumnType::Text));
//!         t.index(["author_id"]);
//!     })?;
//! schema.run(&client).await?;
//! ```

mod column;
mod table;

pub use column::{
    ColumnBuilder, ColumnChanges, ColumnDefinition, ColumnType, ForeignKey, ReferentialAction,
};
pub use table::{AlterOperation, IndexDefinition, IndexMethod, TableBuilder, TableMode};

use crate::client::Executor;
use crate::error::{FluentError, FluentResult};
use crate::escape::escape_identifier;
use crate::value::Value;

/// One queued entry of a [`SchemaBuilder`].
#[derive(Debug)]
pub enum SchemaChange {
    Raw(String),
    Table(TableBuilder),
    DropTable { name: String, if_exists: bool },
    RenameTable { from: String, to: String },
}

impl SchemaChange {
    fn write(&self, out: &mut Vec<String>) -> FluentResult<()> {
        match self {
            SchemaChange::Raw(sql) => out.push(sql.clone()),
            SchemaChange::Table(table) => out.extend(table.to_sql()?),
            SchemaChange::DropTable { name, if_exists } => {
                let guard = if *if_exists { "IF EXISTS " } else { "" };
                out.push(format!("DROP TABLE {guard}{}", escape_identifier(name)?));
            }
            SchemaChange::RenameTable { from, to } => {
                // The new name is unqualified: a table keeps its schema on rename.
                let to = to.rsplit('.').next().unwrap_or(to.as_str());
                out.push(format!(
                    "ALTER TABLE {} RENAME TO {}",
                    escape_identifier(from)?,
                    escape_identifier(to)?
                ));
            }
        }
        Ok(())
    }
}

/// Ordered set of pending schema changes.
///
/// State is cleared only after [`run`](Self::run) commits; a failed run
/// leaves every change queued.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    changes: Vec<SchemaChange>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> &[SchemaChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn push_table<F>(
        &mut self,
        name: impl Into<String>,
        mode: TableMode,
        define: F,
    ) -> FluentResult<&mut Self>
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut table = TableBuilder::new(name, mode);
        define(&mut table);
        self.changes.push(SchemaChange::Table(table.finish()?));
        Ok(self)
    }

    /// Define a new table.
    ///
    /// Fails with [`FluentError::SchemaMismatch`] when the closure renames,
    /// alters or drops a column it never declared.
    pub fn create_table<F>(&mut self, name: impl Into<String>, define: F) -> FluentResult<&mut Self>
    where
        F: FnOnce(&mut TableBuilder),
    {
        self.push_table(name, TableMode::Create, define)
    }

    pub fn create_table_if_not_exists<F>(
        &mut self,
        name: impl Into<String>,
        define: F,
    ) -> FluentResult<&mut Self>
    where
        F: FnOnce(&mut TableBuilder),
    {
        self.push_table(name, TableMode::CreateIfNotExists, define)
    }

    /// Queue changes against an existing table.
    pub fn alter_table<F>(&mut self, name: impl Into<String>, define: F) -> FluentResult<&mut Self>
    where
        F: FnOnce(&mut TableBuilder),
    {
        self.push_table(name, TableMode::Alter, define)
    }

    pub fn drop_table(&mut self, name: impl Into<String>) -> &mut Self {
        self.changes.push(SchemaChange::DropTable {
            name: name.into(),
            if_exists: false,
        });
        self
    }

    pub fn drop_table_if_exists(&mut self, name: impl Into<String>) -> &mut Self {
        self.changes.push(SchemaChange::DropTable {
            name: name.into(),
            if_exists: true,
        });
        self
    }

    pub fn rename_table(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.changes.push(SchemaChange::RenameTable {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Queue a statement verbatim.
    pub fn raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.changes.push(SchemaChange::Raw(sql.into()));
        self
    }

    /// Compile every pending change, in queue order.
    pub fn to_sql(&self) -> FluentResult<Vec<String>> {
        let mut statements = Vec::new();
        for change in &self.changes {
            change.write(&mut statements)?;
        }
        Ok(statements)
    }

    /// The batch [`run`](Self::run) would send.
    pub fn pending_sql(&self) -> FluentResult<String> {
        Ok(join_batch(&self.to_sql()?))
    }

    /// Apply every pending change in one transaction, then clear the queue.
    ///
    /// On failure nothing is cleared and the error is wrapped in
    /// [`FluentError::Ddl`] with the full batch text.
    pub async fn run(&mut self, conn: &impl Executor) -> FluentResult<()> {
        let statements = self.to_sql()?;
        if statements.is_empty() {
            return Ok(());
        }
        let sql = join_batch(&statements);

        match conn.batch_transaction(&sql).await {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    target: "pgfluent.schema",
                    statements = statements.len(),
                    "applied schema changes"
                );
                self.changes.clear();
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    target: "pgfluent.schema",
                    statements = statements.len(),
                    error = %err,
                    "schema changes rolled back"
                );
                Err(FluentError::Ddl {
                    sql,
                    source: Box::new(err),
                })
            }
        }
    }

    /// Whether `table` (optionally `schema.table`) exists; unqualified names
    /// resolve against `current_schema()`.
    pub async fn has_table(conn: &impl Executor, table: &str) -> FluentResult<bool> {
        let (schema, name) = split_qualified(table);
        let rows = conn
            .query(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = COALESCE(?::text, current_schema()) AND table_name = ?::text",
                &[schema, Value::from(name)],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn has_column(conn: &impl Executor, table: &str, column: &str) -> FluentResult<bool> {
        let (schema, name) = split_qualified(table);
        let rows = conn
            .query(
                "SELECT 1 FROM information_schema.columns \
                 WHERE table_schema = COALESCE(?::text, current_schema()) \
                 AND table_name = ?::text AND column_name = ?::text",
                &[schema, Value::from(name), Value::from(column)],
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

fn join_batch(statements: &[String]) -> String {
    let mut sql = statements.join(";\n");
    sql.push(';');
    sql
}

fn split_qualified(table: &str) -> (Value, &str) {
    match table.rsplit_once('.') {
        Some((schema, name)) => (Value::from(schema), name),
        None => (Value::Null, table),
    }
}
