use super::builder::QueryBuilder;
use super::param::{CompiledQuery, SqlWriter};
use crate::client::Executor;
use crate::error::{FluentError, FluentResult};
use crate::record::{IntoRows, Record};
use crate::value::Value;

/// ON CONFLICT behaviour for [`QueryBuilder::upsert`].
///
/// # Example
/// ```ignore
/// let opts = UpsertOptions::new(["id"]).update(["name"]).returning(["name"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOptions {
    pub conflict: Vec<String>,
    /// Columns to overwrite on conflict. `None` means every inserted column
    /// outside the conflict target.
    pub update: Option<Vec<String>>,
    pub returning: Vec<String>,
}

impl UpsertOptions {
    pub fn new<I, S>(conflict: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            conflict: conflict.into_iter().map(Into::into).collect(),
            update: None,
            returning: Vec::new(),
        }
    }

    pub fn update<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }
}

impl QueryBuilder {
    /// `INSERT INTO table (cols) VALUES (...), (...)`; returns the column list.
    ///
    /// Columns come from the first row. Later rows missing a column bind NULL;
    /// a column the first row lacks is an error.
    fn write_insert(&self, w: &mut SqlWriter, rows: &[Record]) -> FluentResult<Vec<String>> {
        let Some(first) = rows.first() else {
            return Err(FluentError::invalid_argument("insert requires at least one row"));
        };
        let columns: Vec<String> = first.columns().map(str::to_string).collect();

        w.push("INSERT INTO ");
        w.push_identifier(&self.table)?;

        if columns.is_empty() {
            if rows.len() > 1 {
                return Err(FluentError::invalid_argument(
                    "cannot insert several rows without columns",
                ));
            }
            w.push(" DEFAULT VALUES");
            return Ok(columns);
        }

        w.push(" (");
        w.push_ident_list(&columns)?;
        w.push(") VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if let Some(extra) = row.columns().find(|c| !columns.iter().any(|k| k.as_str() == *c)) {
                return Err(FluentError::invalid_argument(format!(
                    "row {i} has column '{extra}' that the first row does not"
                )));
            }
            if i > 0 {
                w.push(", ");
            }
            w.push("(");
            for (j, column) in columns.iter().enumerate() {
                if j > 0 {
                    w.push(", ");
                }
                w.push_value(row.get(column).cloned().unwrap_or(Value::Null));
            }
            w.push(")");
        }
        Ok(columns)
    }

    /// Compile an INSERT of one or more rows.
    pub fn insert_sql(
        &self,
        rows: impl IntoRows,
        returning: &[&str],
    ) -> FluentResult<CompiledQuery> {
        let rows = rows.into_rows();
        let mut w = SqlWriter::new();
        self.write_insert(&mut w, &rows)?;
        w.push_returning(returning)?;
        Ok(w.finish())
    }

    /// Compile an INSERT ... ON CONFLICT.
    ///
    /// With nothing left to overwrite (every column is in the conflict target
    /// or excluded by `update`), the statement degrades to `DO NOTHING`.
    pub fn upsert_sql(
        &self,
        rows: impl IntoRows,
        options: &UpsertOptions,
    ) -> FluentResult<CompiledQuery> {
        if options.conflict.is_empty() {
            return Err(FluentError::invalid_argument(
                "upsert requires at least one conflict column",
            ));
        }
        let rows = rows.into_rows();
        let mut w = SqlWriter::new();
        let columns = self.write_insert(&mut w, &rows)?;

        let updates: Vec<&String> = columns
            .iter()
            .filter(|c| !options.conflict.contains(c))
            .filter(|c| options.update.as_ref().is_none_or(|only| only.contains(c)))
            .collect();

        w.push(" ON CONFLICT (");
        w.push_ident_list(&options.conflict)?;
        w.push(")");
        if updates.is_empty() {
            w.push(" DO NOTHING");
        } else {
            w.push(" DO UPDATE SET ");
            for (i, column) in updates.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.push_ident(column)?;
                w.push(" = EXCLUDED.");
                w.push_ident(column)?;
            }
        }
        w.push_returning(&options.returning)?;
        Ok(w.finish())
    }

    /// Insert rows; returns the RETURNING rows (empty without RETURNING).
    pub async fn insert(
        &self,
        conn: &impl Executor,
        rows: impl IntoRows,
        returning: &[&str],
    ) -> FluentResult<Vec<Record>> {
        let query = self.insert_sql(rows, returning)?;
        conn.query(&query.sql, &query.params).await
    }

    pub async fn upsert(
        &self,
        conn: &impl Executor,
        rows: impl IntoRows,
        options: &UpsertOptions,
    ) -> FluentResult<Vec<Record>> {
        let query = self.upsert_sql(rows, options)?;
        conn.query(&query.sql, &query.params).await
    }
}
