//! Result rows and insert/update payloads.

use crate::error::{FluentError, FluentResult};
use crate::value::{FromValue, Value};
use serde::de::DeserializeOwned;
use tokio_postgres::Row;

/// An ordered column-name to value map.
///
/// Column order is insertion order; it decides the column list of an INSERT
/// and the SET order of an UPDATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column, keeping its position if it already exists.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((column, value));
                None
            }
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(name, _)| name == column)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Typed access; a missing column decodes as [`Value::Null`].
    pub fn try_get<T: FromValue>(&self, column: &str) -> FluentResult<T> {
        let value = self.get(column).cloned().unwrap_or(Value::Null);
        T::from_value(value).map_err(|err| match err {
            FluentError::Decode { message, .. } => FluentError::decode(column, message),
            other => other,
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Value of the first column, used by scalar terminals.
    pub fn first_value(&self) -> Option<&Value> {
        self.entries.first().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    pub fn into_json(self) -> serde_json::Value {
        let map = self
            .entries
            .into_iter()
            .map(|(name, value)| (name, value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Deserialize into any serde type via its JSON form.
    pub fn decode<T: DeserializeOwned>(&self) -> FluentResult<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| FluentError::decode("<record>", e.to_string()))
    }

    /// Decode every column of a driver row.
    pub fn from_row(row: &Row) -> FluentResult<Self> {
        let mut entries = Vec::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            let value: Value = row
                .try_get(idx)
                .map_err(|e| FluentError::decode(column.name(), e.to_string()))?;
            entries.push((column.name().to_string(), value));
        }
        Ok(Self { entries })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = FluentError;

    fn try_from(value: serde_json::Value) -> FluentResult<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(FluentError::invalid_argument(format!(
                "expected a JSON object for a record, got {other}"
            ))),
        }
    }
}

/// Build a [`Record`] literal.
///
/// ```ignore
/// let row = pgfluent::record! { "id" => 1, "name" => "Ada" };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::Record::new()$(.set($column, $value))+
    };
}

/// Map a [`Record`] into a typed value.
pub trait FromRecord: Sized {
    fn from_record(record: Record) -> FluentResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: Record) -> FluentResult<Self> {
        Ok(record)
    }
}

impl FromRecord for serde_json::Value {
    fn from_record(record: Record) -> FluentResult<Self> {
        Ok(record.into_json())
    }
}

/// One row or many, for INSERT and UPSERT.
pub trait IntoRows {
    fn into_rows(self) -> Vec<Record>;
}

impl IntoRows for Record {
    fn into_rows(self) -> Vec<Record> {
        vec![self]
    }
}

impl IntoRows for Vec<Record> {
    fn into_rows(self) -> Vec<Record> {
        self
    }
}

impl<const N: usize> IntoRows for [Record; N] {
    fn into_rows(self) -> Vec<Record> {
        self.into_iter().collect()
    }
}

impl IntoRows for &[Record] {
    fn into_rows(self) -> Vec<Record> {
        self.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_position() {
        let mut r = crate::record! { "a" => 1, "b" => 2 };
        assert_eq!(r.insert("a", 3), Some(Value::Int(1)));
        assert_eq!(r.columns().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(r.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn try_get_names_column_on_failure() {
        let r = crate::record! { "age" => "old" };
        let err = r.try_get::<i64>("age").unwrap_err();
        match err {
            FluentError::Decode { column, .. } => assert_eq!(column, "age"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(r.try_get::<Option<i64>>("missing").unwrap(), None);
    }

    #[test]
    fn deserializes_via_json() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct User {
            id: i64,
            name: String,
        }
        let r = crate::record! { "id" => 7, "name" => "Ada" };
        assert_eq!(
            r.decode::<User>().unwrap(),
            User { id: 7, name: "Ada".into() }
        );
    }

    #[test]
    fn from_json_object_only() {
        let r = Record::try_from(serde_json::json!({"id": 1})).unwrap();
        assert_eq!(r.get("id"), Some(&Value::Int(1)));
        assert!(Record::try_from(serde_json::json!([1])).is_err());
    }
}
