use super::builder::QueryBuilder;
use super::param::{CompiledQuery, SqlWriter};
use crate::client::Executor;
use crate::condition::{ConditionMode, write_where};
use crate::error::{FluentError, FluentResult};
use crate::record::Record;

impl QueryBuilder {
    /// Compile `UPDATE table SET ... WHERE ...`.
    ///
    /// Refuses to compile without a WHERE condition. IN/NOT IN bind the whole
    /// array once as `= ANY(?)` / `<> ALL(?)`.
    pub fn update_sql(&self, values: &Record, returning: &[&str]) -> FluentResult<CompiledQuery> {
        if self.conditions.is_empty() {
            return Err(FluentError::MissingCondition("update"));
        }
        if values.is_empty() {
            return Err(FluentError::invalid_argument("update requires at least one column"));
        }

        let mut w = SqlWriter::new();
        w.push("UPDATE ");
        w.push_identifier(&self.table)?;
        w.push(" SET ");
        for (i, (column, value)) in values.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(column)?;
            w.push(" = ");
            w.push_value(value.clone());
        }
        write_where(&mut w, &self.conditions, ConditionMode::Update)?;
        w.push_returning(returning)?;
        Ok(w.finish())
    }

    /// Update matching rows; returns the RETURNING rows.
    ///
    /// Nothing is sent when the builder has no WHERE condition.
    pub async fn update(
        &self,
        conn: &impl Executor,
        values: Record,
        returning: &[&str],
    ) -> FluentResult<Vec<Record>> {
        let query = self.update_sql(&values, returning)?;
        conn.query(&query.sql, &query.params).await
    }
}
