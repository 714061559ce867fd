//! Query data model: operators, WHERE conditions, ordering, joins and
//! projected columns.
//!
//! Everything here is validated on construction; rendering only fails on
//! identifiers that cannot be quoted.

use crate::error::{FluentError, FluentResult};
use crate::escape::{Identifier, RawSql, escape_identifier, quote_literal};
use crate::qb::SqlWriter;
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operator for WHERE and JOIN ... ON.
///
/// # Example
/// ```ignore
/// use pgfluent::Operator;
///
/// assert_eq!("not in".parse::<Operator>()?, Operator::NotIn);
/// assert_eq!(Operator::parse("<>")?, Operator::Ne);
/// # Ok::<(), pgfluent::FluentError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    /// `@>` containment (jsonb, arrays).
    Contains,
}

impl Operator {
    /// Parse an operator token. Keywords are case-insensitive and may be
    /// separated by any amount of whitespace.
    pub fn parse(token: &str) -> FluentResult<Self> {
        let normalized = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "=" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "IN" => Ok(Operator::In),
            "NOT IN" => Ok(Operator::NotIn),
            "IS NULL" => Ok(Operator::IsNull),
            "IS NOT NULL" => Ok(Operator::IsNotNull),
            "@>" => Ok(Operator::Contains),
            _ => Err(FluentError::InvalidOperator(token.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Contains => "@>",
        }
    }

    /// Plain binary comparison, the only kind allowed in JOIN ... ON.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte
        )
    }

    /// Takes no right-hand value.
    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl FromStr for Operator {
    type Err = FluentError;

    fn from_str(s: &str) -> FluentResult<Self> {
        Operator::parse(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// How a condition attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => " AND ",
            Conjunction::Or => " OR ",
        }
    }
}

/// One WHERE entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Column {
        column: Identifier,
        operator: Operator,
        value: Option<Value>,
        conjunction: Conjunction,
    },
    /// Pre-written fragment with `?` placeholders, wrapped in parentheses.
    Raw {
        sql: String,
        params: Vec<Value>,
        conjunction: Conjunction,
    },
}

impl Condition {
    /// Build a column condition, checking the value against the operator's arity.
    pub fn column(
        column: impl Into<Identifier>,
        operator: Operator,
        value: Option<Value>,
        conjunction: Conjunction,
    ) -> FluentResult<Self> {
        let column = column.into();
        match (&value, operator) {
            (Some(_), op) if op.is_unary() => {
                return Err(FluentError::invalid_argument(format!(
                    "operator {op} takes no value (column '{}')",
                    column.as_str()
                )));
            }
            (None, op) if !op.is_unary() => {
                return Err(FluentError::invalid_argument(format!(
                    "operator {op} requires a value (column '{}')",
                    column.as_str()
                )));
            }
            (Some(v), op) if op.is_list() && !v.is_array() => {
                return Err(FluentError::invalid_argument(format!(
                    "operator {op} requires an array, got {} (column '{}')",
                    v.kind_name(),
                    column.as_str()
                )));
            }
            (Some(v), op) if op.is_comparison() && v.is_array() => {
                return Err(FluentError::invalid_argument(format!(
                    "operator {op} requires a scalar or JSON value, got array (column '{}')",
                    column.as_str()
                )));
            }
            _ => {}
        }
        Ok(Condition::Column {
            column,
            operator,
            value,
            conjunction,
        })
    }

    pub fn raw(sql: impl Into<String>, params: Vec<Value>, conjunction: Conjunction) -> Self {
        Condition::Raw {
            sql: sql.into(),
            params,
            conjunction,
        }
    }

    pub fn conjunction(&self) -> Conjunction {
        match self {
            Condition::Column { conjunction, .. } | Condition::Raw { conjunction, .. } => {
                *conjunction
            }
        }
    }
}

/// Controls how IN/NOT IN render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConditionMode {
    /// `IN (?, ?)`; empty lists become constant predicates.
    Select,
    /// `= ANY(?)` / `<> ALL(?)` with the whole array bound once.
    Update,
}

pub(crate) fn write_where(
    w: &mut SqlWriter,
    conditions: &[Condition],
    mode: ConditionMode,
) -> FluentResult<()> {
    if conditions.is_empty() {
        return Ok(());
    }
    w.push(" WHERE ");
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            w.push(condition.conjunction().as_sql());
        }
        write_condition(w, condition, mode)?;
    }
    Ok(())
}

fn write_condition(
    w: &mut SqlWriter,
    condition: &Condition,
    mode: ConditionMode,
) -> FluentResult<()> {
    match condition {
        Condition::Raw { sql, params, .. } => {
            w.push("(");
            w.push_fragment(sql, params)?;
            w.push(")");
        }
        Condition::Column {
            column,
            operator,
            value,
            ..
        } => match (operator, value) {
            (op, _) if op.is_unary() => {
                w.push_identifier(column)?;
                w.push(" ");
                w.push(op.as_sql());
            }
            (op, Some(Value::Array(items))) if op.is_list() => match mode {
                ConditionMode::Select if items.is_empty() => {
                    w.push(if *op == Operator::In { "1=0" } else { "1=1" });
                }
                ConditionMode::Select => {
                    w.push_identifier(column)?;
                    w.push(" ");
                    w.push(op.as_sql());
                    w.push(" (");
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            w.push(", ");
                        }
                        w.push_value(item.clone());
                    }
                    w.push(")");
                }
                ConditionMode::Update => {
                    w.push_identifier(column)?;
                    w.push(if *op == Operator::In { " = ANY(" } else { " <> ALL(" });
                    w.push_value(Value::Array(items.clone()));
                    w.push(")");
                }
            },
            (op, Some(value)) => {
                w.push_identifier(column)?;
                w.push(" ");
                w.push(op.as_sql());
                w.push(" ");
                w.push_value(value.clone());
            }
            (op, None) => {
                return Err(FluentError::invalid_argument(format!(
                    "operator {op} requires a value"
                )));
            }
        },
    }
    Ok(())
}

/// ORDER BY direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `asc`/`desc`, case-insensitive.
    pub fn parse(token: &str) -> FluentResult<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(FluentError::InvalidDirection(token.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = FluentError;

    fn from_str(s: &str) -> FluentResult<Self> {
        Direction::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderSpec {
    Column { column: Identifier, direction: Direction },
    Raw { sql: String, params: Vec<Value> },
}

pub(crate) fn write_order_by(w: &mut SqlWriter, orders: &[OrderSpec]) -> FluentResult<()> {
    if orders.is_empty() {
        return Ok(());
    }
    w.push(" ORDER BY ");
    for (i, order) in orders.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        match order {
            OrderSpec::Column { column, direction } => {
                w.push_identifier(column)?;
                w.push(" ");
                w.push(direction.as_sql());
            }
            OrderSpec::Raw { sql, params } => w.push_fragment(sql, params)?,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// `<kind> JOIN <table> ON <left> <op> <right>`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub table: Identifier,
    pub left: Identifier,
    pub operator: Operator,
    pub right: Identifier,
}

impl JoinSpec {
    pub fn new(
        kind: JoinKind,
        table: impl Into<Identifier>,
        left: impl Into<Identifier>,
        operator: Operator,
        right: impl Into<Identifier>,
    ) -> FluentResult<Self> {
        if !operator.is_comparison() {
            return Err(FluentError::InvalidOperator(operator.as_sql().to_string()));
        }
        Ok(Self {
            kind,
            table: table.into(),
            left: left.into(),
            operator,
            right: right.into(),
        })
    }

    pub(crate) fn write(&self, w: &mut SqlWriter) -> FluentResult<()> {
        w.push(" ");
        w.push(self.kind.as_sql());
        w.push(" ");
        w.push_identifier(&self.table)?;
        w.push(" ON ");
        w.push_identifier(&self.left)?;
        w.push(" ");
        w.push(self.operator.as_sql());
        w.push(" ");
        w.push_identifier(&self.right)?;
        Ok(())
    }
}

/// Project named fields of a json/jsonb column into one object.
///
/// Renders as `jsonb_build_object('f', "col"->'f', ...) AS "alias"`; a dotted
/// field such as `address.city` reads the nested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonProjection {
    pub column: String,
    pub fields: Vec<String>,
    pub alias: Option<String>,
}

impl JsonProjection {
    pub fn new<I, S>(column: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column: column.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn to_sql(&self) -> FluentResult<String> {
        if self.fields.is_empty() {
            return Err(FluentError::invalid_argument(format!(
                "JSON projection of '{}' has no fields",
                self.column
            )));
        }
        let column = escape_identifier(&self.column)?;
        let mut pairs = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let access = if field.contains('.') {
                let path = field.split('.').collect::<Vec<_>>().join(",");
                format!("{column}#>{}", quote_literal(&format!("{{{path}}}")))
            } else {
                format!("{column}->{}", quote_literal(field))
            };
            pairs.push(format!("{}, {access}", quote_literal(field)));
        }
        let alias = match &self.alias {
            Some(alias) => alias.as_str(),
            None => self.column.rsplit('.').next().unwrap_or(&self.column),
        };
        Ok(format!(
            "jsonb_build_object({}) AS {}",
            pairs.join(", "),
            escape_identifier(alias)?
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Column(Identifier),
    Json(JsonProjection),
}

impl SelectColumn {
    pub(crate) fn write(&self, w: &mut SqlWriter) -> FluentResult<()> {
        match self {
            SelectColumn::Column(ident) => w.push_identifier(ident),
            SelectColumn::Json(projection) => {
                let sql = projection.to_sql()?;
                w.push(&sql);
                Ok(())
            }
        }
    }
}

macro_rules! impl_select_column_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SelectColumn {
                fn from(value: $t) -> Self {
                    SelectColumn::Column(value.into())
                }
            }
        )*
    };
}

impl_select_column_from!(&str, String, &String, RawSql, Identifier);

impl From<JsonProjection> for SelectColumn {
    fn from(value: JsonProjection) -> Self {
        SelectColumn::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_operators() {
        assert_eq!(Operator::parse("=").unwrap(), Operator::Eq);
        assert_eq!(Operator::parse("<>").unwrap(), Operator::Ne);
        assert_eq!(Operator::parse("not   in").unwrap(), Operator::NotIn);
        assert_eq!(Operator::parse("is not null").unwrap(), Operator::IsNotNull);
        assert_eq!(Operator::parse("@>").unwrap(), Operator::Contains);
        assert!(matches!(
            Operator::parse("LIKE"),
            Err(FluentError::InvalidOperator(op)) if op == "LIKE"
        ));
    }

    #[test]
    fn parses_directions() {
        assert_eq!(Direction::parse("DESC").unwrap(), Direction::Desc);
        assert_eq!("asc".parse::<Direction>().unwrap(), Direction::Asc);
        assert!(matches!(
            Direction::parse("up"),
            Err(FluentError::InvalidDirection(_))
        ));
    }

    #[test]
    fn condition_checks_arity() {
        assert!(
            Condition::column("a", Operator::IsNull, Some(Value::Int(1)), Conjunction::And)
                .is_err()
        );
        assert!(Condition::column("a", Operator::Eq, None, Conjunction::And).is_err());
        assert!(
            Condition::column("a", Operator::In, Some(Value::Int(1)), Conjunction::And).is_err()
        );
        assert!(
            Condition::column("a", Operator::Eq, Some(Value::from(vec![1])), Conjunction::And)
                .is_err()
        );
        assert!(
            Condition::column(
                "a",
                Operator::Eq,
                Some(Value::Json(serde_json::json!({"k": 1}))),
                Conjunction::And
            )
            .is_ok()
        );
    }

    #[test]
    fn join_rejects_non_comparison() {
        let err = JoinSpec::new(JoinKind::Inner, "b", "a.id", Operator::In, "b.a_id").unwrap_err();
        assert!(matches!(err, FluentError::InvalidOperator(_)));
    }

    #[test]
    fn json_projection_sql() {
        let p = JsonProjection::new("profile", ["name", "address.city"]);
        assert_eq!(
            p.to_sql().unwrap(),
            "jsonb_build_object('name', \"profile\"->'name', \
             'address.city', \"profile\"#>'{address,city}') AS \"profile\""
        );
        let aliased = JsonProjection::new("u.profile", ["name"]).alias("p");
        assert_eq!(
            aliased.to_sql().unwrap(),
            "jsonb_build_object('name', \"u\".\"profile\"->'name') AS \"p\""
        );
    }
}
