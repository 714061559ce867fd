//! SQL text plus its ordered parameter list.

use crate::error::{FluentError, FluentResult};
use crate::escape::{Identifier, escape_identifier};
use crate::placeholder::{count_placeholders, rewrite_placeholders};
use crate::value::Value;
use std::fmt;

/// A compiled statement: SQL with `?` placeholders and the values they bind,
/// in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    /// SQL with `$n` placeholders, as sent to Postgres.
    pub fn to_positional(&self) -> String {
        rewrite_placeholders(&self.sql)
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Accumulates SQL and parameters together so placeholder order always
/// matches parameter order.
#[derive(Debug, Default)]
pub(crate) struct SqlWriter {
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub(crate) fn push_ident(&mut self, name: &str) -> FluentResult<()> {
        let quoted = escape_identifier(name)?;
        self.sql.push_str(&quoted);
        Ok(())
    }

    pub(crate) fn push_identifier(&mut self, ident: &Identifier) -> FluentResult<()> {
        let sql = ident.to_sql()?;
        self.sql.push_str(&sql);
        Ok(())
    }

    /// Comma-separated quoted names.
    pub(crate) fn push_ident_list<S: AsRef<str>>(&mut self, names: &[S]) -> FluentResult<()> {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_ident(name.as_ref())?;
        }
        Ok(())
    }

    /// Bind a value, or inline it when it is raw SQL.
    pub(crate) fn push_value(&mut self, value: Value) {
        match value {
            Value::Raw(sql) => self.sql.push_str(&sql),
            other => {
                self.sql.push('?');
                self.params.push(other);
            }
        }
    }

    /// Append a fragment carrying its own `?` placeholders.
    pub(crate) fn push_fragment(&mut self, sql: &str, params: &[Value]) -> FluentResult<()> {
        let expected = count_placeholders(sql);
        if expected != params.len() {
            return Err(FluentError::invalid_argument(format!(
                "fragment `{sql}` has {expected} placeholder(s) but {} parameter(s)",
                params.len()
            )));
        }
        self.sql.push_str(sql);
        self.params.extend(params.iter().cloned());
        Ok(())
    }

    /// ` RETURNING a, b` when columns were requested.
    pub(crate) fn push_returning<S: AsRef<str>>(&mut self, columns: &[S]) -> FluentResult<()> {
        if columns.is_empty() {
            return Ok(());
        }
        self.sql.push_str(" RETURNING ");
        self.push_ident_list(columns)
    }

    pub(crate) fn finish(self) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}
