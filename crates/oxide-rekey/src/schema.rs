//! Schema representation types.
//!
//! These types describe the primary key being retyped, the foreign keys that
//! point at it, and the column shapes that must survive the retype.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Length applied to length-bearing types when the catalog reports none.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Column type constructors a key (or a column referencing it) can be moved
/// between.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Auto-incrementing unsigned 32-bit primary key.
    Increments,
    /// Auto-incrementing unsigned 64-bit primary key.
    BigIncrements,
    /// Auto-incrementing unsigned 16-bit primary key.
    SmallIncrements,
    /// Auto-incrementing unsigned 24-bit primary key.
    MediumIncrements,
    /// Signed 32-bit integer.
    Integer,
    /// Unsigned 32-bit integer.
    UnsignedInteger,
    /// Signed 64-bit integer.
    BigInteger,
    /// Unsigned 64-bit integer.
    UnsignedBigInteger,
    /// Signed 16-bit integer.
    SmallInteger,
    /// Unsigned 16-bit integer.
    UnsignedSmallInteger,
    /// Signed 24-bit integer.
    MediumInteger,
    /// Unsigned 24-bit integer.
    UnsignedMediumInteger,
    /// Variable-length character string.
    String,
    /// Fixed-length character string.
    Char,
    /// UUID stored as a 36 character string.
    Uuid,
}

impl ColumnType {
    /// Returns whether the column auto-increments.
    #[must_use]
    pub fn is_auto_increment(self) -> bool {
        matches!(
            self,
            Self::Increments | Self::BigIncrements | Self::SmallIncrements | Self::MediumIncrements
        )
    }

    /// Returns whether the type carries a maximum length.
    #[must_use]
    pub fn takes_length(self) -> bool {
        matches!(self, Self::String | Self::Char)
    }

    /// Returns the SQL type name for MySQL.
    ///
    /// `length` is only used by length-bearing types; the others ignore it.
    #[must_use]
    pub fn mysql_name(self, length: Option<u32>) -> String {
        match self {
            Self::Increments | Self::UnsignedInteger => "INT UNSIGNED".to_string(),
            Self::BigIncrements | Self::UnsignedBigInteger => "BIGINT UNSIGNED".to_string(),
            Self::SmallIncrements | Self::UnsignedSmallInteger => "SMALLINT UNSIGNED".to_string(),
            Self::MediumIncrements | Self::UnsignedMediumInteger => {
                "MEDIUMINT UNSIGNED".to_string()
            }
            Self::Integer => "INT".to_string(),
            Self::BigInteger => "BIGINT".to_string(),
            Self::SmallInteger => "SMALLINT".to_string(),
            Self::MediumInteger => "MEDIUMINT".to_string(),
            Self::String => format!("VARCHAR({})", length.unwrap_or(DEFAULT_STRING_LENGTH)),
            Self::Char => format!("CHAR({})", length.unwrap_or(DEFAULT_STRING_LENGTH)),
            Self::Uuid => "CHAR(36)".to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl FromStr for ForeignKeyAction {
    type Err = MigrateError;

    /// Parses a referential action as reported by `information_schema`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "NO ACTION" => Ok(Self::NoAction),
            "RESTRICT" => Ok(Self::Restrict),
            "CASCADE" => Ok(Self::Cascade),
            "SET NULL" => Ok(Self::SetNull),
            "SET DEFAULT" => Ok(Self::SetDefault),
            _ => Err(MigrateError::UnknownRule(s.to_string())),
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql())
    }
}

/// A `(table, column)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Creates a new column reference.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// The primary key being retyped.
pub type TargetKey = ColumnRef;

/// Column types to apply to the key and to every column referencing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeMapping {
    /// Type of the key column itself.
    pub parent: ColumnType,
    /// Type of each referencing column.
    pub child: ColumnType,
}

impl TypeMapping {
    /// Creates a new type mapping.
    #[must_use]
    pub const fn new(parent: ColumnType, child: ColumnType) -> Self {
        Self { parent, child }
    }
}

/// Which way a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply the `to` mapping.
    Up,
    /// Apply the `from` mapping.
    Down,
}

impl Direction {
    /// Picks the mapping this direction moves the columns to.
    #[must_use]
    pub fn select(self, from: TypeMapping, to: TypeMapping) -> TypeMapping {
        match self {
            Self::Up => to,
            Self::Down => from,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// A foreign key discovered in the catalog that references the target key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferencingColumn {
    /// Referencing (child) table.
    pub table_name: String,
    /// Referencing (child) column.
    pub column_name: String,
    /// Name of the foreign key constraint.
    pub constraint_name: String,
}

impl ReferencingColumn {
    /// Creates a new referencing column.
    #[must_use]
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        constraint_name: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            constraint_name: constraint_name.into(),
        }
    }

    /// Returns the `(table, column)` pair of the child column.
    #[must_use]
    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(&self.table_name, &self.column_name)
    }
}

/// Update and delete rules of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConstraintRules {
    /// Action on update.
    pub on_update: ForeignKeyAction,
    /// Action on delete.
    pub on_delete: ForeignKeyAction,
}

impl ConstraintRules {
    /// Creates a new set of rules.
    #[must_use]
    pub fn new(on_update: ForeignKeyAction, on_delete: ForeignKeyAction) -> Self {
        Self {
            on_update,
            on_delete,
        }
    }
}

/// Shape of a column that must be kept when its type changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnAttributes {
    /// Maximum character length, if the column has one.
    pub max_length: Option<u32>,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Collation of a character column.
    pub collation: Option<String>,
}

impl ColumnAttributes {
    /// Creates new column attributes.
    #[must_use]
    pub fn new(max_length: Option<u32>, nullable: bool) -> Self {
        Self {
            max_length,
            nullable,
            collation: None,
        }
    }

    /// Sets the collation.
    #[must_use]
    pub fn with_collation(mut self, collation: Option<String>) -> Self {
        self.collation = collation;
        self
    }
}

/// Single-column foreign key constraint to (re)create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// Constraint name.
    pub name: String,
    /// Referencing table.
    pub table: String,
    /// Referencing column.
    pub column: String,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column.
    pub references_column: String,
    /// Action on delete.
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    pub on_update: ForeignKeyAction,
}

impl ForeignKeyDefinition {
    /// Builds the constraint that restores `column` against `target` with `rules`.
    #[must_use]
    pub fn restore(column: &ReferencingColumn, target: &TargetKey, rules: ConstraintRules) -> Self {
        Self {
            name: column.constraint_name.clone(),
            table: column.table_name.clone(),
            column: column.column_name.clone(),
            references_table: target.table.clone(),
            references_column: target.column.clone(),
            on_delete: rules.on_delete,
            on_update: rules.on_update,
        }
    }

    /// Returns the rules carried by this constraint.
    #[must_use]
    pub fn rules(&self) -> ConstraintRules {
        ConstraintRules::new(self.on_update, self.on_delete)
    }
}
