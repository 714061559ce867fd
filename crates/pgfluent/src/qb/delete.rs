use super::builder::QueryBuilder;
use super::param::{CompiledQuery, SqlWriter};
use crate::client::Executor;
use crate::condition::{ConditionMode, write_where};
use crate::error::{FluentError, FluentResult};
use crate::record::Record;

impl QueryBuilder {
    /// Compile `DELETE FROM table WHERE ...`; refuses without a WHERE condition.
    pub fn delete_sql(&self, returning: &[&str]) -> FluentResult<CompiledQuery> {
        if self.conditions.is_empty() {
            return Err(FluentError::MissingCondition("delete"));
        }
        let mut w = SqlWriter::new();
        w.push("DELETE FROM ");
        w.push_identifier(&self.table)?;
        write_where(&mut w, &self.conditions, ConditionMode::Select)?;
        w.push_returning(returning)?;
        Ok(w.finish())
    }

    /// Delete matching rows; returns the RETURNING rows.
    pub async fn delete(
        &self,
        conn: &impl Executor,
        returning: &[&str],
    ) -> FluentResult<Vec<Record>> {
        let query = self.delete_sql(returning)?;
        conn.query(&query.sql, &query.params).await
    }
}
