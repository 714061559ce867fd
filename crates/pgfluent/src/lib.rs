//! # pgfluent
//!
//! A fluent PostgreSQL query builder, schema builder and migration runner.
//!
//! ## Features
//!
//! - **Escaped by construction**: identifiers are quoted, values bind as parameters
//! - **Safe defaults**: UPDATE and DELETE refuse to run without a WHERE condition
//! - **Atomic DDL**: schema changes apply as one transaction, or not at all
//! - **Explicit execution**: nothing runs until a terminal is handed an [`Executor`]
//! - **Transaction-friendly**: a `tokio_postgres::Transaction` is an executor too
//!
//! ## Query Builder
//!
//! ```ignore
//! use pgfluent::{record, table};
//!
//! let rows = table("users")
//!     .select(["id", "email"])
//!     .where_eq("status", "active")?
//!     .order_by_desc("created_at")
//!     .limit(10)
//!     .fetch_all(&client)
//!     .await?;
//!
//! table("users")
//!     .upsert(
//!         &client,
//!         record! { "id" => 1, "email" => "a@example.com" },
//!         &pgfluent::UpsertOptions::new(["id"]),
//!     )
//!     .await?;
//! ```
//!
//! ## Schema Builder
//!
//! ```ignore
//! let mut schema = pgfluent::SchemaBuilder::new();
//! schema.create_table("users", |t| {
//!     t.increments("id");
//!     t.string("email").unique();
//!     t.timestamps();
//! })?;
//! schema.run(&client).await?;
//! ```

pub mod client;
pub mod condition;
pub mod error;
pub mod escape;
pub mod migrate;
pub mod placeholder;
pub mod qb;
pub mod record;
pub mod schema;
pub mod transaction;
pub mod value;

#[cfg(feature = "tracing")]
pub mod monitor;

#[cfg(feature = "pool")]
pub mod pool;

pub mod prelude;

pub use client::Executor;
pub use condition::{Condition, Conjunction, Direction, JoinKind, JsonProjection, Operator};
pub use error::{FluentError, FluentResult};
pub use escape::{Identifier, RawSql, escape_identifier, escape_value, raw};
pub use migrate::{Migration, Migrator, MigratorConfig, migration};
pub use placeholder::rewrite_placeholders;
pub use qb::{CompiledQuery, QueryBuilder, UpsertOptions, table};
pub use record::{FromRecord, IntoRows, Record};
pub use schema::{ColumnType, SchemaBuilder, TableBuilder};
pub use value::{FromValue, Value};

#[cfg(feature = "tracing")]
pub use monitor::{LogConfig, LoggingExecutor};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_tls};
