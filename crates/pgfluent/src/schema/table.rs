use super::column::{ColumnBuilder, ColumnChanges, ColumnDefinition, ColumnType, default_sql};
use crate::error::{FluentError, FluentResult};
use crate::escape::{escape_identifier, escape_value};
use crate::value::Value;

/// How a table definition is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    Create,
    CreateIfNotExists,
    Alter,
}

impl TableMode {
    pub fn is_create(&self) -> bool {
        !matches!(self, TableMode::Alter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMethod {
    Btree,
    Hash,
    Gist,
    Gin,
    Spgist,
    Brin,
}

impl IndexMethod {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IndexMethod::Btree => "btree",
            IndexMethod::Hash => "hash",
            IndexMethod::Gist => "gist",
            IndexMethod::Gin => "gin",
            IndexMethod::Spgist => "spgist",
            IndexMethod::Brin => "brin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub columns: Vec<String>,
    pub unique: bool,
    pub method: Option<IndexMethod>,
}

/// Queued change against an existing table, replayed in issuance order.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterOperation {
    RenameColumn { from: String, to: String },
    DropColumn(String),
    AlterColumn { name: String, changes: ColumnChanges },
    DropIndex(String),
}

macro_rules! column_helpers {
    ($($(#[$doc:meta])* $method:ident => $ty:expr;)+) => {
        $(
            $(#[$doc])*
            pub fn $method(&mut self, name: impl Into<String>) -> ColumnBuilder<'_> {
                self.column(name, $ty)
            }
        )+
    };
}

/// One table definition, in create or alter mode.
///
/// Obtained from [`SchemaBuilder::create_table`](super::SchemaBuilder::create_table)
/// or [`SchemaBuilder::alter_table`](super::SchemaBuilder::alter_table). New
/// columns, queued operations and indexes keep their insertion order.
#[derive(Debug)]
pub struct TableBuilder {
    name: String,
    mode: TableMode,
    columns: Vec<(String, ColumnDefinition)>,
    operations: Vec<AlterOperation>,
    indexes: Vec<(String, IndexDefinition)>,
    raw: Vec<String>,
    error: Option<FluentError>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>, mode: TableMode) -> Self {
        Self {
            name: name.into(),
            mode,
            columns: Vec::new(),
            operations: Vec::new(),
            indexes: Vec::new(),
            raw: Vec::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> TableMode {
        self.mode
    }

    /// Pending column definitions, in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnDefinition)> {
        self.columns.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn column_definition(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, def)| def)
    }

    pub fn operations(&self) -> &[AlterOperation] {
        &self.operations
    }

    pub fn indexes(&self) -> impl Iterator<Item = (&str, &IndexDefinition)> {
        self.indexes.iter().map(|(name, def)| (name.as_str(), def))
    }

    // ==================== Columns ====================

    /// Register a column of any type. Redeclaring a name replaces its definition in place.
    pub fn column(&mut self, name: impl Into<String>, ty: ColumnType) -> ColumnBuilder<'_> {
        let name = name.into();
        let def = ColumnDefinition::new(ty);
        let idx = match self.columns.iter().position(|(n, _)| *n == name) {
            Some(idx) => {
                self.columns[idx].1 = def;
                idx
            }
            None => {
                self.columns.push((name, def));
                self.columns.len() - 1
            }
        };
        ColumnBuilder::new(&mut self.columns[idx].1)
    }

    column_helpers! {
        /// `varchar(255)`.
        string => ColumnType::Varchar(255);
        text => ColumnType::Text;
        integer => ColumnType::Integer;
        /// Alias of [`integer`](Self::integer).
        number => ColumnType::Integer;
        big_integer => ColumnType::BigInt;
        small_integer => ColumnType::SmallInt;
        float => ColumnType::Real;
        double => ColumnType::DoublePrecision;
        boolean => ColumnType::Boolean;
        date => ColumnType::Date;
        timestamp => ColumnType::Timestamp;
        timestamptz => ColumnType::Timestamptz;
        json => ColumnType::Json;
        jsonb => ColumnType::Jsonb;
        uuid => ColumnType::Uuid;
    }

    pub fn string_len(&mut self, name: impl Into<String>, len: u32) -> ColumnBuilder<'_> {
        self.column(name, ColumnType::Varchar(len))
    }

    pub fn decimal(
        &mut self,
        name: impl Into<String>,
        precision: u32,
        scale: u32,
    ) -> ColumnBuilder<'_> {
        self.column(name, ColumnType::Decimal { precision, scale })
    }

    /// `serial` primary key.
    pub fn increments(&mut self, name: impl Into<String>) -> ColumnBuilder<'_> {
        self.column(name, ColumnType::Serial).primary()
    }

    /// `bigserial` primary key.
    pub fn big_increments(&mut self, name: impl Into<String>) -> ColumnBuilder<'_> {
        self.column(name, ColumnType::BigSerial).primary()
    }

    /// A column whose type is written verbatim.
    pub fn specific_type(
        &mut self,
        name: impl Into<String>,
        sql: impl Into<String>,
    ) -> ColumnBuilder<'_> {
        self.column(name, ColumnType::Specific(sql.into()))
    }

    /// `created_at` and `updated_at`, both `timestamptz` defaulting to `now()`.
    pub fn timestamps(&mut self) {
        self.timestamptz("created_at").default_to(Value::now());
        self.timestamptz("updated_at").default_to(Value::now());
    }

    // ==================== Alter family ====================

    fn record_error(&mut self, err: FluentError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn mismatch(&mut self, column: &str) {
        let err = FluentError::SchemaMismatch {
            table: self.name.clone(),
            column: column.to_string(),
        };
        self.record_error(err);
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == column)
    }

    /// Create mode renames the pending column; alter mode queues `RENAME COLUMN`.
    pub fn rename_column(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let (from, to) = (from.into(), to.into());
        if !self.mode.is_create() {
            self.operations.push(AlterOperation::RenameColumn { from, to });
            return self;
        }
        match self.position(&from) {
            Some(_) if from != to && self.position(&to).is_some() => {
                let err = FluentError::invalid_argument(format!(
                    "column '{to}' already exists on table '{}'",
                    self.name
                ));
                self.record_error(err);
            }
            Some(idx) => self.columns[idx].0 = to,
            None => self.mismatch(&from),
        }
        self
    }

    /// Create mode removes the pending column; alter mode queues `DROP COLUMN`.
    pub fn drop_column(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.mode.is_create() {
            self.operations.push(AlterOperation::DropColumn(name));
            return self;
        }
        match self.position(&name) {
            Some(idx) => {
                self.columns.remove(idx);
            }
            None => self.mismatch(&name),
        }
        self
    }

    /// Create mode folds the changes into the pending column; alter mode
    /// queues one statement per changed field.
    pub fn alter_column(&mut self, name: impl Into<String>, changes: ColumnChanges) -> &mut Self {
        let name = name.into();
        if !self.mode.is_create() {
            if changes.collation.is_some() && changes.ty.is_none() {
                self.record_error(FluentError::invalid_argument(format!(
                    "changing the collation of '{name}' needs its column type"
                )));
            } else if !changes.is_empty() {
                self.operations
                    .push(AlterOperation::AlterColumn { name, changes });
            }
            return self;
        }
        match self.position(&name) {
            Some(idx) => changes.apply_to(&mut self.columns[idx].1),
            None => self.mismatch(&name),
        }
        self
    }

    fn push_index<I, S>(
        &mut self,
        columns: I,
        unique: bool,
        method: Option<IndexMethod>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            self.record_error(FluentError::invalid_argument(format!(
                "index on table '{}' needs at least one column",
                self.name
            )));
            return self;
        }
        let name = self.index_name(&columns);
        let def = IndexDefinition {
            columns,
            unique,
            method,
        };
        match self.indexes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = def,
            None => self.indexes.push((name, def)),
        }
        self
    }

    pub fn index<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_index(columns, false, None)
    }

    pub fn unique_index<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_index(columns, true, None)
    }

    pub fn index_using<I, S>(&mut self, columns: I, method: IndexMethod) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_index(columns, false, Some(method))
    }

    /// Forget a pending index; in alter mode an index not declared here is
    /// dropped from the database.
    pub fn drop_index<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let name = self.index_name(&columns);
        match self.indexes.iter().position(|(n, _)| *n == name) {
            Some(idx) => {
                self.indexes.remove(idx);
            }
            None if !self.mode.is_create() => self.operations.push(AlterOperation::DropIndex(name)),
            None => {}
        }
        self
    }

    /// Statement appended after the table's own DDL.
    pub fn raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.raw.push(sql.into());
        self
    }

    /// `idx_<table>_<columns>`, with `.` flattened to `_`.
    pub fn index_name(&self, columns: &[String]) -> String {
        let mut name = format!("idx_{}", self.name);
        for column in columns {
            name.push('_');
            name.push_str(column);
        }
        name.replace('.', "_")
    }

    /// Surface the first error recorded while the definition was built.
    pub(crate) fn finish(mut self) -> FluentResult<Self> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    // ==================== Compilation ====================

    /// Compile to DDL statements.
    ///
    /// Create mode: one `CREATE TABLE`. Alter mode: one `ADD COLUMN` per new
    /// column, then the queued operations in order. Then `CREATE INDEX`
    /// statements and raw SQL.
    pub fn to_sql(&self) -> FluentResult<Vec<String>> {
        let table = escape_identifier(&self.name)?;
        let mut statements = Vec::new();

        if self.mode.is_create() {
            let defs = self
                .columns
                .iter()
                .map(|(name, def)| def.to_sql(name))
                .collect::<FluentResult<Vec<_>>>()?;
            let head = match self.mode {
                TableMode::CreateIfNotExists => "CREATE TABLE IF NOT EXISTS",
                _ => "CREATE TABLE",
            };
            statements.push(format!("{head} {table} ({})", defs.join(", ")));
        } else {
            for (name, def) in &self.columns {
                statements.push(format!("ALTER TABLE {table} ADD COLUMN {}", def.to_sql(name)?));
            }
            for op in &self.operations {
                self.write_operation(&table, op, &mut statements)?;
            }
        }

        for (name, index) in &self.indexes {
            statements.push(self.create_index_sql(&table, name, index)?);
        }
        statements.extend(self.raw.iter().cloned());
        Ok(statements)
    }

    fn write_operation(
        &self,
        table: &str,
        op: &AlterOperation,
        out: &mut Vec<String>,
    ) -> FluentResult<()> {
        match op {
            AlterOperation::RenameColumn { from, to } => out.push(format!(
                "ALTER TABLE {table} RENAME COLUMN {} TO {}",
                escape_identifier(from)?,
                escape_identifier(to)?
            )),
            AlterOperation::DropColumn(name) => out.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                escape_identifier(name)?
            )),
            AlterOperation::AlterColumn { name, changes } => {
                let column = escape_identifier(name)?;
                let alter = format!("ALTER TABLE {table} ALTER COLUMN {column}");
                if let Some(ty) = &changes.ty {
                    let collate = match &changes.collation {
                        Some(collation) => format!(" COLLATE {}", escape_identifier(collation)?),
                        None => String::new(),
                    };
                    out.push(format!(
                        "{alter} TYPE {}{collate} USING {column}::{}",
                        ty.to_sql(),
                        ty.cast_sql()
                    ));
                }
                if let Some(nullable) = changes.nullable {
                    let clause = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                    out.push(format!("{alter} {clause}"));
                }
                match &changes.default {
                    Some(Some(value)) => {
                        let default = match &changes.ty {
                            Some(ty) => default_sql(value, ty)?,
                            None => escape_value(value)?,
                        };
                        out.push(format!("{alter} SET DEFAULT {default}"));
                    }
                    Some(None) => out.push(format!("{alter} DROP DEFAULT")),
                    None => {}
                }
                if let Some(primary) = changes.primary {
                    if primary {
                        out.push(format!("ALTER TABLE {table} ADD PRIMARY KEY ({column})"));
                    } else {
                        let constraint = escape_identifier(&self.constraint_name(None, "pkey"))?;
                        out.push(format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}"));
                    }
                }
                if let Some(unique) = changes.unique {
                    let constraint = escape_identifier(&self.constraint_name(Some(name), "key"))?;
                    if unique {
                        out.push(format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {constraint} UNIQUE ({column})"
                        ));
                    } else {
                        out.push(format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}"));
                    }
                }
                if let Some(check) = &changes.check {
                    let constraint = escape_identifier(&self.constraint_name(Some(name), "check"))?;
                    match check {
                        Some(expr) => out.push(format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {constraint} CHECK ({expr})"
                        )),
                        None => {
                            out.push(format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}"))
                        }
                    }
                }
                if let Some(references) = &changes.references {
                    let constraint = escape_identifier(&self.constraint_name(Some(name), "fkey"))?;
                    match references {
                        Some(fk) => out.push(format!(
                            "ALTER TABLE {table} ADD CONSTRAINT {constraint} \
                             FOREIGN KEY ({column}) {}",
                            fk.to_sql()?
                        )),
                        None => {
                            out.push(format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}"))
                        }
                    }
                }
            }
            AlterOperation::DropIndex(name) => {
                out.push(format!("DROP INDEX {}", self.qualified_index(name)?));
            }
        }
        Ok(())
    }

    fn create_index_sql(
        &self,
        table: &str,
        name: &str,
        index: &IndexDefinition,
    ) -> FluentResult<String> {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if self.mode == TableMode::CreateIfNotExists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&escape_identifier(name)?);
        sql.push_str(" ON ");
        sql.push_str(table);
        if let Some(method) = index.method {
            sql.push_str(" USING ");
            sql.push_str(method.as_sql());
        }
        let columns = index
            .columns
            .iter()
            .map(|c| escape_identifier(c))
            .collect::<FluentResult<Vec<_>>>()?;
        sql.push_str(" (");
        sql.push_str(&columns.join(", "));
        sql.push(')');
        Ok(sql)
    }

    /// Postgres' default constraint names: `<table>_pkey`, `<table>_<column>_<suffix>`.
    fn constraint_name(&self, column: Option<&str>, suffix: &str) -> String {
        let table = self.name.rsplit('.').next().unwrap_or(&self.name);
        match column {
            Some(column) => format!("{table}_{column}_{suffix}"),
            None => format!("{table}_{suffix}"),
        }
    }

    /// Indexes live in their table's schema.
    fn qualified_index(&self, name: &str) -> FluentResult<String> {
        match self.name.rsplit_once('.') {
            Some((schema, _)) => Ok(format!(
                "{}.{}",
                escape_identifier(schema)?,
                escape_identifier(name)?
            )),
            None => escape_identifier(name),
        }
    }
}
