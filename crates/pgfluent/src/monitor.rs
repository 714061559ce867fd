//! SQL logging through `tracing`.
//!
//! Wrap any [`Executor`] in a [`LoggingExecutor`] to emit one event per
//! statement on the `pgfluent.sql` target.
//!
//! ```ignore
//! use pgfluent::monitor::{LogConfig, LoggingExecutor};
//!
//! let conn = LoggingExecutor::new(client).with_config(LogConfig::new().no_truncate());
//! let rows = pgfluent::table("users").fetch_all(&conn).await?;
//! ```

use crate::client::Executor;
use crate::error::FluentResult;
use crate::record::Record;
use crate::value::Value;
use std::time::Instant;
use tracing::Level;

/// Truncate to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for successful statements; failures always log at WARN.
    pub level: Level,
    /// Truncate long SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn display_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

/// An [`Executor`] that logs every statement it forwards.
#[derive(Debug, Clone)]
pub struct LoggingExecutor<E> {
    inner: E,
    config: LogConfig,
}

impl<E: Executor> LoggingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn log<T>(
        &self,
        kind: &'static str,
        sql: &str,
        param_count: usize,
        started: Instant,
        result: &FluentResult<T>,
    ) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.config.display_sql(sql);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(_) => emit_at_level!(
                self.config.level,
                target: "pgfluent.sql",
                kind,
                param_count,
                elapsed_ms,
                sql = %sql,
            ),
            Err(err) => tracing::warn!(
                target: "pgfluent.sql",
                kind,
                param_count,
                elapsed_ms,
                sql = %sql,
                error = %err,
                "statement failed"
            ),
        }
    }
}

impl<E: Executor> Executor for LoggingExecutor<E> {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Record>> {
        let started = Instant::now();
        let result = self.inner.query(sql, params).await;
        self.log("query", sql, params.len(), started, &result);
        result
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        let started = Instant::now();
        let result = self.inner.execute(sql, params).await;
        self.log("execute", sql, params.len(), started, &result);
        result
    }

    async fn batch_execute(&self, sql: &str) -> FluentResult<()> {
        let started = Instant::now();
        let result = self.inner.batch_execute(sql).await;
        self.log("batch", sql, 0, started, &result);
        result
    }

    async fn batch_transaction(&self, sql: &str) -> FluentResult<()> {
        let started = Instant::now();
        let result = self.inner.batch_transaction(sql).await;
        self.log("transaction", sql, 0, started, &result);
        result
    }
}
