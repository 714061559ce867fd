//! Dynamic values used as bound parameters, escapable literals and decoded
//! result cells.
//!
//! [`Value`] implements `tokio_postgres`'s [`ToSql`] and [`FromSql`] with
//! type-directed conversion, so one value type works against any column
//! type Postgres infers for a placeholder.

use crate::error::{FluentError, FluentResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};

/// The sentinel text passed through unquoted by the value escaper.
pub const NOW: &str = "now()";

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact numeric, read from and bound to `numeric` columns.
    Decimal(Decimal),
    Text(String),
    Array(Vec<Value>),
    Timestamp(DateTime<Utc>),
    /// JSON document (objects, or any JSON read back from a json/jsonb column).
    Json(serde_json::Value),
    /// Pre-written SQL, emitted verbatim and never bound.
    Raw(String),
}

impl Value {
    /// The `now()` sentinel, rendered unquoted by [`escape_value`](crate::escape::escape_value).
    pub fn now() -> Self {
        Value::Text(NOW.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Value::Raw(_))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Raw(_) => "raw sql",
        }
    }

    /// Convert to a JSON value (timestamps become RFC 3339 strings).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => serde_json::Value::String(d.to_string()),
            Value::Text(s) | Value::Raw(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Value::Json(v) => v.clone(),
        }
    }
}

// ==================== Conversions into Value ====================

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<crate::escape::RawSql> for Value {
    fn from(v: crate::escape::RawSql) -> Self {
        Value::Raw(v.into_inner())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// JSON scalars map to their scalar variant, arrays to [`Value::Array`],
/// objects stay JSON.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            obj @ serde_json::Value::Object(_) => Value::Json(obj),
        }
    }
}

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```ignore
/// let params = pgfluent::params![1, "active", true];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

// ==================== Binding (ToSql) ====================

type BoxError = Box<dyn Error + Sync + Send>;

fn is_text_like(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    ) || matches!(ty.kind(), Kind::Enum(_))
        || ty.name() == "citext"
}

fn cannot_bind(value: &Value, ty: &Type) -> BoxError {
    format!(
        "cannot bind {} value to parameter of type {}",
        value.kind_name(),
        ty
    )
    .into()
}

/// Shortest round-trip text of the float, so `9.99` binds as `9.99`.
fn float_to_decimal(f: f64) -> Result<Decimal, BoxError> {
    if !f.is_finite() {
        return Err(format!("non-finite float {f} cannot be bound as numeric").into());
    }
    Ok(f.to_string().parse::<Decimal>()?)
}

fn int_to_sql(
    value: &Value,
    v: i64,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT8 => v.to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        _ if is_text_like(ty) => v.to_string().to_sql(ty, out),
        _ => Err(cannot_bind(value, ty)),
    }
}

fn text_to_sql(
    value: &Value,
    s: &str,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, BoxError> {
    match *ty {
        Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
        Type::NUMERIC => s.parse::<Decimal>()?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::String(s.to_string()).to_sql(ty, out),
        Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(s)?
            .with_timezone(&Utc)
            .to_sql(ty, out),
        Type::DATE => s.parse::<NaiveDate>()?.to_sql(ty, out),
        _ if is_text_like(ty) => s.to_sql(ty, out),
        _ => Err(cannot_bind(value, ty)),
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ => Err(cannot_bind(self, ty)),
            },
            Value::Int(i) => int_to_sql(self, *i, ty, out),
            Value::Float(f) => match *ty {
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => float_to_decimal(*f)?.to_sql(ty, out),
                _ => Err(cannot_bind(self, ty)),
            },
            Value::Decimal(d) => match *ty {
                Type::NUMERIC => d.to_sql(ty, out),
                Type::FLOAT8 => d
                    .to_f64()
                    .ok_or_else(|| cannot_bind(self, ty))?
                    .to_sql(ty, out),
                _ if is_text_like(ty) => d.to_string().to_sql(ty, out),
                _ => Err(cannot_bind(self, ty)),
            },
            Value::Text(s) | Value::Raw(s) => text_to_sql(self, s, ty, out),
            Value::Array(items) => match ty.kind() {
                // Vec<T>::to_sql panics on a non-array type, so check first.
                Kind::Array(_) => items.to_sql(ty, out),
                _ => Err(cannot_bind(self, ty)),
            },
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.to_sql(ty, out),
                Type::TIMESTAMP => ts.naive_utc().to_sql(ty, out),
                Type::DATE => ts.date_naive().to_sql(ty, out),
                _ if is_text_like(ty) => ts.to_rfc3339().to_sql(ty, out),
                _ => Err(cannot_bind(self, ty)),
            },
            Value::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ if is_text_like(ty) => v.to_string().to_sql(ty, out),
                _ => Err(cannot_bind(self, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

// ==================== Decoding (FromSql) ====================

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        match ty.kind() {
            Kind::Array(_) => return Ok(Value::Array(Vec::<Value>::from_sql(ty, raw)?)),
            Kind::Enum(_) => return Ok(Value::Text(String::from_sql(ty, raw)?)),
            _ => {}
        }

        match *ty {
            Type::BOOL => Ok(Value::Bool(bool::from_sql(ty, raw)?)),
            Type::INT2 => Ok(Value::Int(i64::from(i16::from_sql(ty, raw)?))),
            Type::INT4 => Ok(Value::Int(i64::from(i32::from_sql(ty, raw)?))),
            Type::INT8 => Ok(Value::Int(i64::from_sql(ty, raw)?)),
            Type::OID => Ok(Value::Int(i64::from(u32::from_sql(ty, raw)?))),
            Type::FLOAT4 => Ok(Value::Float(f64::from(f32::from_sql(ty, raw)?))),
            Type::FLOAT8 => Ok(Value::Float(f64::from_sql(ty, raw)?)),
            Type::NUMERIC => Ok(Value::Decimal(Decimal::from_sql(ty, raw)?)),
            Type::UUID => Ok(Value::Text(uuid::Uuid::from_sql(ty, raw)?.to_string())),
            Type::JSON | Type::JSONB => Ok(Value::Json(serde_json::Value::from_sql(ty, raw)?)),
            Type::TIMESTAMPTZ => Ok(Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?)),
            Type::TIMESTAMP => Ok(Value::Timestamp(
                NaiveDateTime::from_sql(ty, raw)?.and_utc(),
            )),
            Type::DATE => {
                let date = NaiveDate::from_sql(ty, raw)?;
                let midnight = date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| format!("invalid date {date}"))?;
                Ok(Value::Timestamp(midnight.and_utc()))
            }
            _ if is_text_like(ty) => Ok(Value::Text(String::from_sql(ty, raw)?)),
            _ => Err(format!("unsupported column type {}", ty).into()),
        }
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

// ==================== Typed extraction ====================

/// Convert a decoded [`Value`] into a typed Rust value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> FluentResult<Self>;
}

fn mismatch(expected: &str, got: &Value) -> FluentError {
    FluentError::decode("?", format!("expected {expected}, got {}", got.kind_name()))
}

impl FromValue for Value {
    fn from_value(value: Value) -> FluentResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> FluentResult<Self> {
        let i = i64::from_value(value)?;
        i32::try_from(i).map_err(|e| FluentError::decode("?", e.to_string()))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| FluentError::decode("?", format!("{d} does not fit in f64"))),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(i) => Ok(Decimal::from(i)),
            Value::Text(s) => s
                .parse()
                .map_err(|e: rust_decimal::Error| FluentError::decode("?", e.to_string())),
            other => Err(mismatch("decimal", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Text(s) | Value::Raw(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> FluentResult<Self> {
        Ok(match value {
            Value::Json(v) => v,
            other => other.to_json(),
        })
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| FluentError::decode("?", e.to_string())),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> FluentResult<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}
