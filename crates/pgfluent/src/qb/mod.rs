//! Fluent query builder.
//!
//! One [`QueryBuilder`] per table accumulates projection, conditions, joins,
//! ordering and paging, then compiles to SQL with `?` placeholders and an
//! ordered parameter list ([`CompiledQuery`]). Terminals hand the compiled
//! statement to an [`Executor`](crate::Executor).
//!
//! # Usage
//!
//! ```ignore
//! use pgfluent::{record, table};
//!
//! let active = table("users")
//!     .select(["id", "name"])
//!     .where_eq("status", "active")?
//!     .where_op("age", ">=", 18)?
//!     .order_by("created_at", "desc")?
//!     .limit(20)
//!     .fetch_all(&client)
//!     .await?;
//!
//! table("users")
//!     .insert(&client, record! { "name" => "Ada", "status" => "active" }, &["id"])
//!     .await?;
//!
//! table("users")
//!     .where_in("id", vec![1, 2, 3])?
//!     .update(&client, record! { "status" => "inactive" }, &[])
//!     .await?;
//!
//! // Refuses to run: no WHERE condition.
//! assert!(table("users").delete_sql(&[]).is_err());
//! ```

mod builder;
mod delete;
mod insert;
mod param;
mod select;
mod update;

pub use builder::QueryBuilder;
pub use insert::UpsertOptions;
pub use param::CompiledQuery;
pub(crate) use param::SqlWriter;

use crate::escape::Identifier;

/// Start a query against `table` (a name, dotted name, or [`raw`](crate::raw) source).
///
/// # Example
/// ```ignore
/// let qb = pgfluent::table("users").where_eq("id", 1)?;
/// ```
pub fn table(table: impl Into<Identifier>) -> QueryBuilder {
    QueryBuilder::new(table)
}
