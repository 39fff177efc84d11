//! Schema mutations a key retype is made of.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{ColumnAttributes, ColumnType, ForeignKeyDefinition};

/// Applies schema changes to the database.
///
/// Each mutation returns the statement it ran (or, in dry-run mode, would
/// have run).
#[async_trait]
pub trait SchemaEditor: Send + Sync {
    /// Drops a foreign key constraint from `table`.
    async fn drop_foreign_key(&self, table: &str, constraint_name: &str) -> Result<String>;

    /// Changes the type of `table.column`.
    ///
    /// `attributes` carries the nullability and length to keep; `None` means
    /// the column is the key itself and is declared NOT NULL.
    async fn alter_column_type(
        &self,
        table: &str,
        column: &str,
        column_type: ColumnType,
        attributes: Option<&ColumnAttributes>,
    ) -> Result<String>;

    /// Creates a foreign key constraint.
    async fn add_foreign_key(&self, foreign_key: &ForeignKeyDefinition) -> Result<String>;

    /// Takes the advisory lock named `name`.
    async fn acquire_lock(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Releases the advisory lock named `name`.
    async fn release_lock(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}
