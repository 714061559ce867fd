//! Identifier quoting and literal escaping.
//!
//! - Dotted names quote each segment: `public.users` becomes `"public"."users"`.
//! - `*`, `table.*` and `count(*)` pass through unquoted.
//! - Embedded `"` is doubled; empty segments and NUL are rejected.
//!
//! # Example
//! ```ignore
//! use pgfluent::escape::{escape_identifier, escape_value};
//!
//! assert_eq!(escape_identifier("u.name")?, r#""u"."name""#);
//! assert_eq!(escape_value(&"O'Brien".into())?, "'O''Brien'");
//! # Ok::<(), pgfluent::FluentError>(())
//! ```

use crate::error::{FluentError, FluentResult};
use crate::value::{NOW, Value};
use chrono::SecondsFormat;

/// Pre-written SQL that bypasses quoting and binding.
///
/// Build it with [`raw`]. Accepted wherever an identifier or a value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSql(String);

impl RawSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Mark a SQL fragment as raw.
pub fn raw(sql: impl Into<String>) -> RawSql {
    RawSql(sql.into())
}

/// A table or column reference: either a name to quote or raw SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Name(String),
    Raw(String),
}

impl Identifier {
    /// Render for embedding in SQL.
    pub fn to_sql(&self) -> FluentResult<String> {
        match self {
            Identifier::Name(name) => escape_identifier(name),
            Identifier::Raw(sql) => Ok(sql.clone()),
        }
    }

    /// The unquoted name, or the raw text.
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Name(s) | Identifier::Raw(s) => s,
        }
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Name(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::Name(s)
    }
}

impl From<&String> for Identifier {
    fn from(s: &String) -> Self {
        Identifier::Name(s.clone())
    }
}

impl From<RawSql> for Identifier {
    fn from(r: RawSql) -> Self {
        Identifier::Raw(r.0)
    }
}

fn quote_segment(segment: &str) -> String {
    format!("\"{}\"", segment.replace('"', "\"\""))
}

/// Quote a (possibly dotted) identifier.
pub fn escape_identifier(name: &str) -> FluentResult<String> {
    if name.is_empty() {
        return Err(FluentError::invalid_argument("Empty identifier"));
    }
    if name.contains('\0') {
        return Err(FluentError::invalid_argument(
            "Identifier cannot contain NUL character",
        ));
    }
    if name == "*" || name.eq_ignore_ascii_case("count(*)") {
        return Ok(name.to_string());
    }

    let segments: Vec<&str> = name.split('.').collect();
    let last = segments.len() - 1;
    let mut out = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(FluentError::invalid_argument(format!(
                "Identifier '{name}' has an empty segment"
            )));
        }
        if i == last && i > 0 && *segment == "*" {
            out.push("*".to_string());
        } else {
            out.push(quote_segment(segment));
        }
    }
    Ok(out.join("."))
}

/// Quote a text literal, doubling embedded single quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Render a value as an inline SQL literal.
///
/// Used only where Postgres cannot take a bound parameter (column defaults,
/// migration bookkeeping). Everything else binds.
pub fn escape_value(value: &Value) -> FluentResult<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) if f.is_finite() => Ok(f.to_string()),
        Value::Float(f) => Err(FluentError::unsupported(format!(
            "non-finite number {f} cannot be written as a literal"
        ))),
        Value::Decimal(d) => Ok(d.to_string()),
        Value::Text(s) if s == NOW => Ok(NOW.to_string()),
        Value::Text(s) => Ok(quote_literal(s)),
        Value::Array(items) if items.is_empty() => Ok("'{}'".to_string()),
        Value::Array(items) => {
            let parts = items.iter().map(escape_value).collect::<FluentResult<Vec<_>>>()?;
            Ok(format!("ARRAY[{}]", parts.join(", ")))
        }
        Value::Timestamp(ts) => Ok(quote_literal(
            &ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        )),
        Value::Json(v) => Ok(quote_literal(&v.to_string())),
        Value::Raw(sql) => Ok(sql.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn quotes_dotted_identifiers() {
        assert_eq!(escape_identifier("users").unwrap(), "\"users\"");
        assert_eq!(escape_identifier("public.users").unwrap(), "\"public\".\"users\"");
        assert_eq!(escape_identifier("u.*").unwrap(), "\"u\".*");
        assert_eq!(escape_identifier("*").unwrap(), "*");
        assert_eq!(escape_identifier("COUNT(*)").unwrap(), "COUNT(*)");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(escape_identifier("we\"ird").unwrap(), "\"we\"\"ird\"");
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(escape_identifier("").is_err());
        assert!(escape_identifier("a..b").is_err());
        assert!(escape_identifier("a\0b").is_err());
    }

    #[test]
    fn escapes_scalars() {
        assert_eq!(escape_value(&Value::Null).unwrap(), "NULL");
        assert_eq!(escape_value(&Value::Bool(true)).unwrap(), "TRUE");
        assert_eq!(escape_value(&Value::Int(-3)).unwrap(), "-3");
        assert_eq!(escape_value(&Value::Float(1.5)).unwrap(), "1.5");
        assert_eq!(
            escape_value(&Value::Decimal(rust_decimal::Decimal::new(1050, 2))).unwrap(),
            "10.50"
        );
        assert_eq!(escape_value(&Value::from("O'Brien")).unwrap(), "'O''Brien'");
        assert_eq!(escape_value(&Value::now()).unwrap(), "now()");
    }

    #[test]
    fn rejects_non_finite_floats() {
        let err = escape_value(&Value::Float(f64::NAN)).unwrap_err();
        assert!(matches!(err, FluentError::Unsupported(_)));
    }

    #[test]
    fn escapes_arrays_json_and_timestamps() {
        let arr = Value::from(vec!["a", "b"]);
        assert_eq!(escape_value(&arr).unwrap(), "ARRAY['a', 'b']");
        assert_eq!(escape_value(&Value::Array(vec![])).unwrap(), "'{}'");

        let nested = Value::Array(vec![vec![1i64, 2].into(), vec![3i64].into()]);
        assert_eq!(escape_value(&nested).unwrap(), "ARRAY[ARRAY[1, 2], ARRAY[3]]");
        let inner_empty = Value::Array(vec![vec![1i64].into(), Value::Array(vec![])]);
        assert_eq!(escape_value(&inner_empty).unwrap(), "ARRAY[ARRAY[1], '{}']");

        let json = Value::Json(serde_json::json!({"k": "it's"}));
        assert_eq!(escape_value(&json).unwrap(), r#"'{"k":"it''s"}'"#);

        let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            escape_value(&Value::Timestamp(ts)).unwrap(),
            "'2024-01-02T03:04:05.000Z'"
        );
    }

    #[test]
    fn raw_passes_through() {
        assert_eq!(
            escape_value(&Value::from(raw("now() - interval '1 day'"))).unwrap(),
            "now() - interval '1 day'"
        );
        assert_eq!(
            Identifier::from(raw("count(distinct id)")).to_sql().unwrap(),
            "count(distinct id)"
        );
    }
}
