use crate::condition::{
    Condition, Conjunction, Direction, JoinKind, JoinSpec, JsonProjection, Operator, OrderSpec,
    SelectColumn,
};
use crate::error::FluentResult;
use crate::escape::Identifier;
use crate::value::Value;

/// Fluent builder for one table.
///
/// Configuration methods consume and return the builder; the ones that
/// validate input return `FluentResult<Self>`. Terminals (`fetch_all`,
/// `insert`, `update`, ...) borrow it, so one configured builder can be
/// compiled or executed several times.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    pub(crate) table: Identifier,
    pub(crate) columns: Vec<SelectColumn>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) joins: Vec<JoinSpec>,
    pub(crate) orders: Vec<OrderSpec>,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
}

impl QueryBuilder {
    pub fn new(table: impl Into<Identifier>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &Identifier {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    // ==================== Projection ====================

    /// Replace the projection. An empty list keeps the current one (or `*`).
    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<SelectColumn>,
    {
        let columns: Vec<SelectColumn> = columns.into_iter().map(Into::into).collect();
        if !columns.is_empty() {
            self.columns = columns;
        }
        self
    }

    /// Add a projection of json/jsonb fields as one object, aliased to
    /// `alias` or the column name.
    pub fn select_json<I, S>(
        mut self,
        column: impl Into<String>,
        fields: I,
        alias: Option<&str>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut projection = JsonProjection::new(column, fields);
        if let Some(alias) = alias {
            projection = projection.alias(alias);
        }
        self.columns.push(SelectColumn::Json(projection));
        self
    }

    // ==================== WHERE ====================

    fn push_condition(
        mut self,
        column: impl Into<Identifier>,
        operator: Operator,
        value: Option<Value>,
        conjunction: Conjunction,
    ) -> FluentResult<Self> {
        self.conditions
            .push(Condition::column(column, operator, value, conjunction)?);
        Ok(self)
    }

    /// `column = value`.
    pub fn where_eq(
        self,
        column: impl Into<Identifier>,
        value: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::Eq, Some(value.into()), Conjunction::And)
    }

    /// `column <op> value` for any operator that takes a value.
    pub fn where_op(
        self,
        column: impl Into<Identifier>,
        op: &str,
        value: impl Into<Value>,
    ) -> FluentResult<Self> {
        let op = Operator::parse(op)?;
        self.push_condition(column, op, Some(value.into()), Conjunction::And)
    }

    /// `column IS NULL` / `column IS NOT NULL` from an operator token.
    pub fn where_unary(self, column: impl Into<Identifier>, op: &str) -> FluentResult<Self> {
        let op = Operator::parse(op)?;
        self.push_condition(column, op, None, Conjunction::And)
    }

    pub fn where_in(
        self,
        column: impl Into<Identifier>,
        values: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::In, Some(values.into()), Conjunction::And)
    }

    pub fn where_not_in(
        self,
        column: impl Into<Identifier>,
        values: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::NotIn, Some(values.into()), Conjunction::And)
    }

    pub fn where_null(mut self, column: impl Into<Identifier>) -> Self {
        self.conditions.push(Condition::Column {
            column: column.into(),
            operator: Operator::IsNull,
            value: None,
            conjunction: Conjunction::And,
        });
        self
    }

    pub fn where_not_null(mut self, column: impl Into<Identifier>) -> Self {
        self.conditions.push(Condition::Column {
            column: column.into(),
            operator: Operator::IsNotNull,
            value: None,
            conjunction: Conjunction::And,
        });
        self
    }

    /// `column @> value` (jsonb or array containment).
    pub fn where_contains(
        self,
        column: impl Into<Identifier>,
        value: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::Contains, Some(value.into()), Conjunction::And)
    }

    /// Raw predicate with `?` placeholders, wrapped in parentheses.
    pub fn where_raw(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.conditions
            .push(Condition::raw(sql, params, Conjunction::And));
        self
    }

    pub fn or_where_eq(
        self,
        column: impl Into<Identifier>,
        value: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::Eq, Some(value.into()), Conjunction::Or)
    }

    pub fn or_where_op(
        self,
        column: impl Into<Identifier>,
        op: &str,
        value: impl Into<Value>,
    ) -> FluentResult<Self> {
        let op = Operator::parse(op)?;
        self.push_condition(column, op, Some(value.into()), Conjunction::Or)
    }

    pub fn or_where_unary(self, column: impl Into<Identifier>, op: &str) -> FluentResult<Self> {
        let op = Operator::parse(op)?;
        self.push_condition(column, op, None, Conjunction::Or)
    }

    pub fn or_where_in(
        self,
        column: impl Into<Identifier>,
        values: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::In, Some(values.into()), Conjunction::Or)
    }

    pub fn or_where_not_in(
        self,
        column: impl Into<Identifier>,
        values: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::NotIn, Some(values.into()), Conjunction::Or)
    }

    pub fn or_where_null(mut self, column: impl Into<Identifier>) -> Self {
        self.conditions.push(Condition::Column {
            column: column.into(),
            operator: Operator::IsNull,
            value: None,
            conjunction: Conjunction::Or,
        });
        self
    }

    pub fn or_where_not_null(mut self, column: impl Into<Identifier>) -> Self {
        self.conditions.push(Condition::Column {
            column: column.into(),
            operator: Operator::IsNotNull,
            value: None,
            conjunction: Conjunction::Or,
        });
        self
    }

    pub fn or_where_contains(
        self,
        column: impl Into<Identifier>,
        value: impl Into<Value>,
    ) -> FluentResult<Self> {
        self.push_condition(column, Operator::Contains, Some(value.into()), Conjunction::Or)
    }

    pub fn or_where_raw(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.conditions
            .push(Condition::raw(sql, params, Conjunction::Or));
        self
    }

    /// Append a prebuilt condition.
    pub fn where_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    // ==================== JOIN ====================

    fn push_join(
        mut self,
        kind: JoinKind,
        table: impl Into<Identifier>,
        left: impl Into<Identifier>,
        operator: Operator,
        right: impl Into<Identifier>,
    ) -> FluentResult<Self> {
        self.joins
            .push(JoinSpec::new(kind, table, left, operator, right)?);
        Ok(self)
    }

    /// `INNER JOIN table ON left = right`.
    pub fn join(
        mut self,
        table: impl Into<Identifier>,
        left: impl Into<Identifier>,
        right: impl Into<Identifier>,
    ) -> Self {
        self.joins.push(JoinSpec {
            kind: JoinKind::Inner,
            table: table.into(),
            left: left.into(),
            operator: Operator::Eq,
            right: right.into(),
        });
        self
    }

    /// `INNER JOIN table ON left <op> right`; only comparison operators are allowed.
    pub fn join_op(
        self,
        table: impl Into<Identifier>,
        left: impl Into<Identifier>,
        op: &str,
        right: impl Into<Identifier>,
    ) -> FluentResult<Self> {
        let op = Operator::parse(op)?;
        self.push_join(JoinKind::Inner, table, left, op, right)
    }

    /// `LEFT JOIN table ON left = right`.
    pub fn left_join(
        mut self,
        table: impl Into<Identifier>,
        left: impl Into<Identifier>,
        right: impl Into<Identifier>,
    ) -> Self {
        self.joins.push(JoinSpec {
            kind: JoinKind::Left,
            table: table.into(),
            left: left.into(),
            operator: Operator::Eq,
            right: right.into(),
        });
        self
    }

    pub fn left_join_op(
        self,
        table: impl Into<Identifier>,
        left: impl Into<Identifier>,
        op: &str,
        right: impl Into<Identifier>,
    ) -> FluentResult<Self> {
        let op = Operator::parse(op)?;
        self.push_join(JoinKind::Left, table, left, op, right)
    }

    // ==================== ORDER BY / LIMIT / OFFSET ====================

    /// Order by a column; `direction` is `asc` or `desc` in any case.
    pub fn order_by(
        mut self,
        column: impl Into<Identifier>,
        direction: &str,
    ) -> FluentResult<Self> {
        let direction = Direction::parse(direction)?;
        self.orders.push(OrderSpec::Column {
            column: column.into(),
            direction,
        });
        Ok(self)
    }

    pub fn order_by_asc(mut self, column: impl Into<Identifier>) -> Self {
        self.orders.push(OrderSpec::Column {
            column: column.into(),
            direction: Direction::Asc,
        });
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<Identifier>) -> Self {
        self.orders.push(OrderSpec::Column {
            column: column.into(),
            direction: Direction::Desc,
        });
        self
    }

    /// Raw ORDER BY item with `?` placeholders.
    pub fn order_by_raw(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.orders.push(OrderSpec::Raw {
            sql: sql.into(),
            params,
        });
        self
    }

    /// Set LIMIT; `limit(0)` emits `LIMIT 0`.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn clear_limit(mut self) -> Self {
        self.limit = None;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn clear_offset(mut self) -> Self {
        self.offset = None;
        self
    }
}
