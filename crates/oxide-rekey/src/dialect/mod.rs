//! Database dialect implementations.
//!
//! Each dialect knows how to spell the three schema changes a key retype
//! needs: dropping a foreign key, changing a column's type, and adding a
//! foreign key back.

mod mysql;

pub use mysql::MySqlDialect;

use crate::schema::{ColumnAttributes, ColumnType, ForeignKeyDefinition};

/// Trait for database-specific SQL generation.
pub trait KeyDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, column_type: ColumnType, length: Option<u32>) -> String;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Generates SQL dropping a foreign key constraint.
    fn drop_foreign_key_sql(&self, table: &str, constraint_name: &str) -> String;

    /// Generates SQL changing the type of an existing column.
    ///
    /// `attributes` is `None` for the key column itself and `Some` for
    /// referencing columns whose shape must be kept. Only nullability, length
    /// and collation are carried; DEFAULT and COMMENT clauses are not.
    fn alter_column_sql(
        &self,
        table: &str,
        column: &str,
        column_type: ColumnType,
        attributes: Option<&ColumnAttributes>,
    ) -> String;

    /// Generates column definition SQL (everything after the column name).
    fn column_definition(
        &self,
        column_type: ColumnType,
        attributes: Option<&ColumnAttributes>,
    ) -> String {
        let length = attributes
            .and_then(|a| a.max_length)
            .filter(|_| column_type.takes_length());
        let mut parts = vec![self.type_name(column_type, length)];

        if let Some(collation) = attributes
            .and_then(|a| a.collation.as_deref())
            .filter(|_| column_type.takes_length())
        {
            parts.push(format!("COLLATE {collation}"));
        }

        match attributes {
            Some(attrs) if attrs.nullable => parts.push("NULL".to_string()),
            _ => parts.push("NOT NULL".to_string()),
        }

        if column_type.is_auto_increment() {
            parts.push(self.auto_increment_keyword().to_string());
        }

        parts.join(" ")
    }

    /// Generates SQL adding a foreign key constraint.
    fn add_foreign_key_sql(&self, foreign_key: &ForeignKeyDefinition) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.quote_identifier(&foreign_key.table),
            self.quote_identifier(&foreign_key.name),
            self.quote_identifier(&foreign_key.column),
            self.quote_identifier(&foreign_key.references_table),
            self.quote_identifier(&foreign_key.references_column),
            foreign_key.on_delete.to_sql(),
            foreign_key.on_update.to_sql(),
        )
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
