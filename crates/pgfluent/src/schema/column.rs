//! Column types, column definitions and the chainable column handle.

use crate::error::FluentResult;
use crate::escape::{escape_identifier, escape_value};
use crate::value::Value;
use std::fmt;

/// SQL column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Varchar(u32),
    Text,
    SmallInt,
    Integer,
    BigInt,
    Serial,
    BigSerial,
    Decimal { precision: u32, scale: u32 },
    Real,
    DoublePrecision,
    Boolean,
    Date,
    Timestamp,
    Timestamptz,
    Json,
    Jsonb,
    Uuid,
    /// Any other type, written verbatim (`text[]`, `citext`, `tsvector`, ...).
    Specific(String),
}

impl ColumnType {
    pub fn to_sql(&self) -> String {
        match self {
            ColumnType::Varchar(len) => format!("varchar({len})"),
            ColumnType::Text => "text".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Serial => "serial".to_string(),
            ColumnType::BigSerial => "bigserial".to_string(),
            ColumnType::Decimal { precision, scale } => format!("decimal({precision}, {scale})"),
            ColumnType::Real => "real".to_string(),
            ColumnType::DoublePrecision => "double precision".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::Timestamptz => "timestamptz".to_string(),
            ColumnType::Json => "json".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Specific(sql) => sql.clone(),
        }
    }

    /// The type used in casts; the serial pseudo-types are not castable.
    pub fn cast_sql(&self) -> String {
        match self {
            ColumnType::Serial => "integer".to_string(),
            ColumnType::BigSerial => "bigint".to_string(),
            other => other.to_sql(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: None,
            on_update: None,
        }
    }

    /// `REFERENCES "table" ("column") [ON DELETE ..] [ON UPDATE ..]`
    pub fn to_sql(&self) -> FluentResult<String> {
        let mut sql = format!(
            "REFERENCES {} ({})",
            escape_identifier(&self.table)?,
            escape_identifier(&self.column)?
        );
        if let Some(action) = self.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = self.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        Ok(sql)
    }
}

/// A column as it will be created.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub primary: bool,
    pub unique: bool,
    pub check: Option<String>,
    pub references: Option<ForeignKey>,
    pub collation: Option<String>,
}

impl ColumnDefinition {
    /// A NOT NULL column with no constraints.
    pub fn new(ty: ColumnType) -> Self {
        Self {
            ty,
            nullable: false,
            default: None,
            primary: false,
            unique: false,
            check: None,
            references: None,
            collation: None,
        }
    }

    /// `"name" type [COLLATE ..] [NOT NULL] [DEFAULT ..] [PRIMARY KEY] [UNIQUE]
    /// [CHECK (..)] [REFERENCES ..]`
    pub fn to_sql(&self, name: &str) -> FluentResult<String> {
        let mut sql = format!("{} {}", escape_identifier(name)?, self.ty.to_sql());
        if let Some(collation) = &self.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(&escape_identifier(collation)?);
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default_sql(default, &self.ty)?);
        }
        if self.primary {
            sql.push_str(" PRIMARY KEY");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(check) = &self.check {
            sql.push_str(" CHECK (");
            sql.push_str(check);
            sql.push(')');
        }
        if let Some(fk) = &self.references {
            sql.push(' ');
            sql.push_str(&fk.to_sql()?);
        }
        Ok(sql)
    }
}

/// `<escaped>::<type>`; raw SQL defaults are not cast.
pub(crate) fn default_sql(value: &Value, ty: &ColumnType) -> FluentResult<String> {
    let literal = escape_value(value)?;
    if value.is_raw() {
        return Ok(literal);
    }
    Ok(format!("{literal}::{}", ty.cast_sql()))
}

/// Chainable handle over one pending column.
///
/// # Example
/// ```ignore
/// t.string("email").unique().collate("C");
/// t.integer("team_id").nullable().references("teams", "id").on_delete(ReferentialAction::Cascade);
/// ```
pub struct ColumnBuilder<'a> {
    def: &'a mut ColumnDefinition,
}

impl<'a> ColumnBuilder<'a> {
    pub(crate) fn new(def: &'a mut ColumnDefinition) -> Self {
        Self { def }
    }

    pub fn nullable(self) -> Self {
        self.def.nullable = true;
        self
    }

    pub fn not_nullable(self) -> Self {
        self.def.nullable = false;
        self
    }

    /// Literal default (escaped and cast to the column type), or raw SQL via [`raw`](crate::raw).
    pub fn default_to(self, value: impl Into<Value>) -> Self {
        self.def.default = Some(value.into());
        self
    }

    pub fn primary(self) -> Self {
        self.def.primary = true;
        self
    }

    pub fn unique(self) -> Self {
        self.def.unique = true;
        self
    }

    /// Column CHECK constraint; the expression is SQL, written as given.
    pub fn check(self, expr: impl Into<String>) -> Self {
        self.def.check = Some(expr.into());
        self
    }

    pub fn references(self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.def.references = Some(ForeignKey::new(table, column));
        self
    }

    /// Has no effect before [`references`](Self::references).
    pub fn on_delete(self, action: ReferentialAction) -> Self {
        if let Some(fk) = self.def.references.as_mut() {
            fk.on_delete = Some(action);
        }
        self
    }

    /// Has no effect before [`references`](Self::references).
    pub fn on_update(self, action: ReferentialAction) -> Self {
        if let Some(fk) = self.def.references.as_mut() {
            fk.on_update = Some(action);
        }
        self
    }

    pub fn collate(self, collation: impl Into<String>) -> Self {
        self.def.collation = Some(collation.into());
        self
    }
}

/// Partial column definition for `alter_column`. Unset fields stay as they are.
///
/// # Example
/// ```ignore
/// ColumnChanges::new().ty(ColumnType::Text).nullable(true).drop_default();
/// ColumnChanges::new().references("teams", "id").on_delete(ReferentialAction::Cascade);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnChanges {
    pub ty: Option<ColumnType>,
    pub nullable: Option<bool>,
    /// `Some(None)` drops the default.
    pub default: Option<Option<Value>>,
    pub primary: Option<bool>,
    pub unique: Option<bool>,
    /// `Some(None)` drops the check constraint.
    pub check: Option<Option<String>>,
    /// `Some(None)` drops the foreign key.
    pub references: Option<Option<ForeignKey>>,
    /// Altering the collation needs [`ty`](Self::ty) as well.
    pub collation: Option<String>,
}

impl ColumnChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ty(mut self, ty: ColumnType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn default_to(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(Some(value.into()));
        self
    }

    pub fn drop_default(mut self) -> Self {
        self.default = Some(None);
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(Some(expr.into()));
        self
    }

    pub fn drop_check(mut self) -> Self {
        self.check = Some(None);
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(Some(ForeignKey::new(table, column)));
        self
    }

    /// Has no effect before [`references`](Self::references).
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(Some(fk)) = self.references.as_mut() {
            fk.on_delete = Some(action);
        }
        self
    }

    /// Has no effect before [`references`](Self::references).
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        if let Some(Some(fk)) = self.references.as_mut() {
            fk.on_update = Some(action);
        }
        self
    }

    pub fn drop_references(mut self) -> Self {
        self.references = Some(None);
        self
    }

    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ty.is_none()
            && self.nullable.is_none()
            && self.default.is_none()
            && self.primary.is_none()
            && self.unique.is_none()
            && self.check.is_none()
            && self.references.is_none()
            && self.collation.is_none()
    }

    /// Fold into a pending definition (create mode).
    pub(crate) fn apply_to(&self, def: &mut ColumnDefinition) {
        if let Some(ty) = &self.ty {
            def.ty = ty.clone();
        }
        if let Some(nullable) = self.nullable {
            def.nullable = nullable;
        }
        if let Some(default) = &self.default {
            def.default = default.clone();
        }
        if let Some(primary) = self.primary {
            def.primary = primary;
        }
        if let Some(unique) = self.unique {
            def.unique = unique;
        }
        if let Some(check) = &self.check {
            def.check = check.clone();
        }
        if let Some(references) = &self.references {
            def.references = references.clone();
        }
        if let Some(collation) = &self.collation {
            def.collation = Some(collation.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::raw;

    #[test]
    fn type_names() {
        assert_eq!(ColumnType::Varchar(255).to_sql(), "varchar(255)");
        assert_eq!(
            ColumnType::Decimal { precision: 10, scale: 2 }.to_sql(),
            "decimal(10, 2)"
        );
        assert_eq!(ColumnType::Serial.cast_sql(), "integer");
        assert_eq!(ColumnType::Specific("text[]".into()).to_sql(), "text[]");
    }

    #[test]
    fn full_column_definition() {
        let mut def = ColumnDefinition::new(ColumnType::Integer);
        ColumnBuilder::new(&mut def)
            .nullable()
            .default_to(0)
            .check("\"score\" >= 0")
            .references("teams", "id")
            .on_delete(ReferentialAction::Cascade);
        assert_eq!(
            def.to_sql("score").unwrap(),
            "\"score\" integer DEFAULT 0::integer CHECK (\"score\" >= 0) \
             REFERENCES \"teams\" (\"id\") ON DELETE CASCADE"
        );
    }

    #[test]
    fn defaults_are_cast_unless_raw() {
        let ty = ColumnType::Varchar(255);
        assert_eq!(default_sql(&Value::from("x"), &ty).unwrap(), "'x'::varchar(255)");
        assert_eq!(
            default_sql(&Value::now(), &ColumnType::Timestamptz).unwrap(),
            "now()::timestamptz"
        );
        assert_eq!(
            default_sql(&raw("gen_random_uuid()").into(), &ColumnType::Uuid).unwrap(),
            "gen_random_uuid()"
        );
    }

    #[test]
    fn collation_follows_type() {
        let mut def = ColumnDefinition::new(ColumnType::Text);
        ColumnBuilder::new(&mut def).collate("C").unique();
        assert_eq!(
            def.to_sql("code").unwrap(),
            "\"code\" text COLLATE \"C\" NOT NULL UNIQUE"
        );
    }

    #[test]
    fn on_delete_without_reference_is_ignored() {
        let mut def = ColumnDefinition::new(ColumnType::Integer);
        ColumnBuilder::new(&mut def).on_delete(ReferentialAction::SetNull);
        assert!(def.references.is_none());

        let changes = ColumnChanges::new().on_update(ReferentialAction::Cascade);
        assert!(changes.is_empty());
    }

    #[test]
    fn changes_fold_constraints_into_definition() {
        let mut def = ColumnDefinition::new(ColumnType::Integer);
        ColumnBuilder::new(&mut def).check("x > 0").unique();
        ColumnChanges::new()
            .primary(true)
            .drop_check()
            .references("teams", "id")
            .on_update(ReferentialAction::Restrict)
            .apply_to(&mut def);
        assert!(def.primary);
        assert!(def.unique);
        assert_eq!(def.check, None);
        assert_eq!(
            def.references.as_ref().map(|fk| fk.on_update),
            Some(Some(ReferentialAction::Restrict))
        );

        ColumnChanges::new().drop_references().collate("C").apply_to(&mut def);
        assert!(def.references.is_none());
        assert_eq!(def.collation.as_deref(), Some("C"));
    }
}
