//! Read-only access to the database's metadata catalog.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{ColumnAttributes, ConstraintRules, ReferencingColumn, TargetKey};

/// Introspection needed to retype a key without losing its foreign keys.
///
/// Implementations answer for the database the connection currently points
/// at; nothing here mutates the schema.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Lists every foreign key whose referenced table and column match `target`.
    ///
    /// An empty list is a valid answer.
    async fn referencing_columns(&self, target: &TargetKey) -> Result<Vec<ReferencingColumn>>;

    /// Returns the update/delete rules of a foreign key.
    ///
    /// Fails with [`MigrateError::RuleLookup`](crate::error::MigrateError::RuleLookup)
    /// if the constraint no longer exists.
    async fn constraint_rules(&self, constraint_name: &str) -> Result<ConstraintRules>;

    /// Returns nullability and maximum length of a column.
    ///
    /// Fails with [`MigrateError::ColumnNotFound`](crate::error::MigrateError::ColumnNotFound)
    /// if the column does not exist.
    async fn column_attributes(&self, table: &str, column: &str) -> Result<ColumnAttributes>;
}
