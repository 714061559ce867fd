//! Common imports.
//!
//! ```ignore
//! use pgfluent::prelude::*;
//! ```

pub use crate::{
    Executor, FluentError, FluentResult, FromRecord, FromValue, Migration, Migrator, QueryBuilder,
    Record, SchemaBuilder, UpsertOptions, Value, migration, params, raw, record, table,
};
pub use crate::schema::{ColumnChanges, ColumnType, IndexMethod, ReferentialAction};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
