use super::builder::QueryBuilder;
use super::param::{CompiledQuery, SqlWriter};
use crate::client::Executor;
use crate::condition::{ConditionMode, SelectColumn, write_order_by, write_where};
use crate::error::FluentResult;
use crate::escape::Identifier;
use crate::record::{FromRecord, Record};
use crate::value::{FromValue, Value};

impl QueryBuilder {
    fn write_select(
        &self,
        w: &mut SqlWriter,
        columns: &[SelectColumn],
        limit: Option<i64>,
    ) -> FluentResult<()> {
        w.push("SELECT ");
        if columns.is_empty() {
            w.push("*");
        } else {
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                column.write(w)?;
            }
        }
        self.write_source(w)?;
        write_order_by(w, &self.orders)?;
        if let Some(limit) = limit {
            w.push(" LIMIT ");
            w.push_value(Value::Int(limit));
        }
        if let Some(offset) = self.offset {
            w.push(" OFFSET ");
            w.push_value(Value::Int(offset));
        }
        Ok(())
    }

    /// ` FROM table JOIN ... WHERE ...`
    fn write_source(&self, w: &mut SqlWriter) -> FluentResult<()> {
        w.push(" FROM ");
        w.push_identifier(&self.table)?;
        for join in &self.joins {
            join.write(w)?;
        }
        write_where(w, &self.conditions, ConditionMode::Select)
    }

    /// Compile the SELECT this builder describes.
    pub fn to_sql(&self) -> FluentResult<CompiledQuery> {
        let mut w = SqlWriter::new();
        self.write_select(&mut w, &self.columns, self.limit)?;
        Ok(w.finish())
    }

    /// The SELECT [`first`](Self::first) runs: same query with `LIMIT 1`.
    pub fn first_sql(&self) -> FluentResult<CompiledQuery> {
        let mut w = SqlWriter::new();
        self.write_select(&mut w, &self.columns, Some(1))?;
        Ok(w.finish())
    }

    /// `SELECT COUNT(*)` over the same FROM/JOIN/WHERE; ordering and paging are dropped.
    pub fn count_sql(&self) -> FluentResult<CompiledQuery> {
        let mut w = SqlWriter::new();
        w.push("SELECT COUNT(*)");
        self.write_source(&mut w)?;
        Ok(w.finish())
    }

    /// The SELECT [`pluck`](Self::pluck) runs: only `column` is projected.
    pub fn pluck_sql(&self, column: impl Into<Identifier>) -> FluentResult<CompiledQuery> {
        let mut w = SqlWriter::new();
        self.write_select(&mut w, &[SelectColumn::Column(column.into())], self.limit)?;
        Ok(w.finish())
    }

    // ==================== Terminals ====================

    /// Run the SELECT and return every row.
    pub async fn fetch_all(&self, conn: &impl Executor) -> FluentResult<Vec<Record>> {
        let query = self.to_sql()?;
        conn.query(&query.sql, &query.params).await
    }

    /// Run the SELECT and map every row.
    pub async fn fetch_all_as<T: FromRecord>(&self, conn: &impl Executor) -> FluentResult<Vec<T>> {
        self.fetch_all(conn)
            .await?
            .into_iter()
            .map(T::from_record)
            .collect()
    }

    /// First row, or `None` when nothing matches. The builder's own limit is untouched.
    pub async fn first(&self, conn: &impl Executor) -> FluentResult<Option<Record>> {
        let query = self.first_sql()?;
        let rows = conn.query(&query.sql, &query.params).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn first_as<T: FromRecord>(&self, conn: &impl Executor) -> FluentResult<Option<T>> {
        self.first(conn).await?.map(T::from_record).transpose()
    }

    /// Number of matching rows.
    pub async fn count(&self, conn: &impl Executor) -> FluentResult<i64> {
        let query = self.count_sql()?;
        let rows = conn.query(&query.sql, &query.params).await?;
        match rows.first().and_then(Record::first_value) {
            Some(value) => i64::from_value(value.clone()),
            None => Ok(0),
        }
    }

    /// One column's values from every matching row.
    pub async fn pluck<T: FromValue>(
        &self,
        conn: &impl Executor,
        column: impl Into<Identifier>,
    ) -> FluentResult<Vec<T>> {
        let query = self.pluck_sql(column)?;
        let rows = conn.query(&query.sql, &query.params).await?;
        rows.into_iter()
            .map(|row| T::from_value(row.first_value().cloned().unwrap_or(Value::Null)))
            .collect()
    }
}
