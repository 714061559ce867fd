//! The executor seam between builders and a live connection.

use crate::error::{FluentError, FluentResult};
use crate::placeholder::rewrite_placeholders;
use crate::record::Record;
use crate::transaction::next_savepoint_name;
use crate::value::Value;
use std::future::Future;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Runs compiled statements.
///
/// Builders emit `?` placeholders; implementations are expected to rewrite
/// them (see [`rewrite_placeholders`]) before sending. Implemented for
/// `tokio_postgres::Client`, `tokio_postgres::Transaction`, the deadpool
/// client types, and references to any executor.
pub trait Executor: Send + Sync {
    /// Run a statement and return its rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = FluentResult<Vec<Record>>> + Send;

    /// Run a statement and return the affected row count.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = FluentResult<u64>> + Send;

    /// Run one or more `;`-separated statements without parameters.
    fn batch_execute(&self, sql: &str) -> impl Future<Output = FluentResult<()>> + Send;

    /// Run a batch atomically.
    ///
    /// The default wraps the batch in `BEGIN`/`COMMIT` and issues `ROLLBACK`
    /// on failure. Executors already inside a transaction use a savepoint.
    fn batch_transaction(&self, sql: &str) -> impl Future<Output = FluentResult<()>> + Send {
        async move {
            self.batch_execute("BEGIN").await?;
            match self.batch_execute(sql).await {
                Ok(()) => self.batch_execute("COMMIT").await,
                Err(err) => match self.batch_execute("ROLLBACK").await {
                    Ok(()) => Err(err),
                    Err(rollback_err) => Err(FluentError::Other(format!(
                        "{err} (rollback failed: {rollback_err})"
                    ))),
                },
            }
        }
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn into_records(rows: Vec<Row>) -> FluentResult<Vec<Record>> {
    rows.iter().map(Record::from_row).collect()
}

impl Executor for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Record>> {
        let sql = rewrite_placeholders(sql);
        let rows = tokio_postgres::Client::query(self, sql.as_str(), &param_refs(params))
            .await
            .map_err(FluentError::from_db_error)?;
        into_records(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        let sql = rewrite_placeholders(sql);
        tokio_postgres::Client::execute(self, sql.as_str(), &param_refs(params))
            .await
            .map_err(FluentError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> FluentResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(FluentError::from_db_error)
    }
}

impl Executor for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Record>> {
        let sql = rewrite_placeholders(sql);
        let rows = tokio_postgres::Transaction::query(self, sql.as_str(), &param_refs(params))
            .await
            .map_err(FluentError::from_db_error)?;
        into_records(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        let sql = rewrite_placeholders(sql);
        tokio_postgres::Transaction::execute(self, sql.as_str(), &param_refs(params))
            .await
            .map_err(FluentError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> FluentResult<()> {
        tokio_postgres::Transaction::batch_execute(self, sql)
            .await
            .map_err(FluentError::from_db_error)
    }

    async fn batch_transaction(&self, sql: &str) -> FluentResult<()> {
        savepoint_batch(self, sql).await
    }
}

/// Nest a batch inside an open transaction.
async fn savepoint_batch<E: Executor + ?Sized>(executor: &E, sql: &str) -> FluentResult<()> {
    let name = next_savepoint_name();
    executor.batch_execute(&format!("SAVEPOINT {name}")).await?;
    match executor.batch_execute(sql).await {
        Ok(()) => executor.batch_execute(&format!("RELEASE SAVEPOINT {name}")).await,
        Err(err) => match executor
            .batch_execute(&format!("ROLLBACK TO SAVEPOINT {name}"))
            .await
        {
            Ok(()) => Err(err),
            Err(rollback_err) => Err(FluentError::Other(format!(
                "{err} (savepoint rollback failed: {rollback_err})"
            ))),
        },
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = FluentResult<Vec<Record>>> + Send {
        (**self).query(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = FluentResult<u64>> + Send {
        (**self).execute(sql, params)
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = FluentResult<()>> + Send {
        (**self).batch_execute(sql)
    }

    fn batch_transaction(&self, sql: &str) -> impl Future<Output = FluentResult<()>> + Send {
        (**self).batch_transaction(sql)
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Record>> {
        Executor::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        Executor::execute(&**self, sql, params).await
    }

    async fn batch_execute(&self, sql: &str) -> FluentResult<()> {
        Executor::batch_execute(&**self, sql).await
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Record>> {
        // Delegate to the deref target (ClientWrapper).
        Executor::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        Executor::execute(&**self, sql, params).await
    }

    async fn batch_execute(&self, sql: &str) -> FluentResult<()> {
        Executor::batch_execute(&**self, sql).await
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Record>> {
        Executor::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        Executor::execute(&**self, sql, params).await
    }

    async fn batch_execute(&self, sql: &str) -> FluentResult<()> {
        Executor::batch_execute(&**self, sql).await
    }

    async fn batch_transaction(&self, sql: &str) -> FluentResult<()> {
        savepoint_batch(self, sql).await
    }
}
