//! Scoped transactions.
//!
//! A `tokio_postgres::Transaction` is itself an [`Executor`](crate::Executor),
//! so the body of [`transaction!`] passes it to builders and schema runs
//! like any other connection.
//!
//! # Example
//!
//! ```ignore
//! use pgfluent::{record, table, FluentResult};
//!
//! # async fn demo(client: &mut tokio_postgres::Client) -> FluentResult<()> {
//! pgfluent::transaction!(client, tx, {
//!     table("accounts")
//!         .where_eq("id", 1)?
//!         .update(&tx, record! { "balance" => 0 }, &[])
//!         .await?;
//!     table("audit").insert(&tx, record! { "event" => "reset" }, &[]).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs the block inside a transaction: commit on `Ok`, roll back on `Err`.
///
/// The block must evaluate to `pgfluent::FluentResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        #[allow(unused_mut)]
        let mut $tx = ($client)
            .transaction()
            .await
            .map_err($crate::FluentError::from_db_error)?;

        let __pgfluent_tx_result = async { $body }.await;
        match __pgfluent_tx_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err($crate::FluentError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::FluentError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Runs the block inside an anonymous savepoint of an open transaction.
///
/// A failure rolls back to the savepoint and leaves the outer transaction usable.
#[macro_export]
macro_rules! nested_transaction {
    ($tx:expr, $inner:ident, $body:block) => {{
        let __pgfluent_sp_name = $crate::transaction::next_savepoint_name();
        #[allow(unused_mut)]
        let mut $inner = ($tx)
            .savepoint(&__pgfluent_sp_name)
            .await
            .map_err($crate::FluentError::from_db_error)?;

        let __pgfluent_sp_result = async { $body }.await;
        match __pgfluent_sp_result {
            Ok(value) => {
                $inner
                    .commit()
                    .await
                    .map_err($crate::FluentError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $inner.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::FluentError::Other(format!(
                    "{error} (savepoint rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Unique savepoint name for this process.
pub fn next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("pgfluent_sp_{n}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savepoint_names_are_unique() {
        let a = next_savepoint_name();
        let b = next_savepoint_name();
        assert_ne!(a, b);
        assert!(a.starts_with("pgfluent_sp_"));
    }
}
