//! Error types for pgfluent

use thiserror::Error;

/// Result type alias for pgfluent operations
pub type FluentResult<T> = Result<T, FluentError>;

/// Error types for query compilation, schema compilation and execution
#[derive(Debug, Error)]
pub enum FluentError {
    /// An identifier or value that cannot be used where it was passed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A value the escaper or the parameter encoder cannot represent
    #[error("Unsupported value: {0}")]
    Unsupported(String),

    /// Unknown WHERE/JOIN operator token
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(String),

    /// Unknown ORDER BY direction token
    #[error("Invalid order direction: '{0}'")]
    InvalidDirection(String),

    /// UPDATE or DELETE issued without any WHERE condition
    #[error("Refusing to {0} without a WHERE condition")]
    MissingCondition(&'static str),

    /// Column referenced by a create-mode table definition does not exist
    #[error("Column '{column}' is not defined on table '{table}'")]
    SchemaMismatch { table: String, column: String },

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// A DDL batch failed; carries the full generated SQL.
    #[error("{source}\n-- while running schema changes:\n{sql}")]
    Ddl {
        sql: String,
        #[source]
        source: Box<FluentError>,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Migration history error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl FluentError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an unsupported value error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a missing WHERE guard error
    pub fn is_missing_condition(&self) -> bool {
        matches!(self, Self::MissingCondition(_))
    }

    /// Check if this error came from the validation layer, before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::Unsupported(_)
                | Self::InvalidOperator(_)
                | Self::InvalidDirection(_)
                | Self::MissingCondition(_)
                | Self::SchemaMismatch { .. }
        )
    }

    /// The generated SQL attached to a failed DDL batch, if any.
    pub fn ddl_sql(&self) -> Option<&str> {
        match self {
            Self::Ddl { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Parse a tokio_postgres error into a more specific FluentError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for FluentError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_error_displays_sql() {
        let err = FluentError::Ddl {
            sql: "CREATE TABLE \"t\" ()".to_string(),
            source: Box::new(FluentError::Other("boom".to_string())),
        };
        let text = err.to_string();
        assert!(text.starts_with("boom"));
        assert!(text.contains("CREATE TABLE \"t\" ()"));
        assert_eq!(err.ddl_sql(), Some("CREATE TABLE \"t\" ()"));
    }

    #[test]
    fn invalid_operator_names_token() {
        let err = FluentError::InvalidOperator("bogus".to_string());
        assert_eq!(err.to_string(), "Invalid operator: 'bogus'");
        assert!(err.is_validation());
    }
}
