//! Dry-run wrapper.
//!
//! [`DryRun`] reads the catalog of the database it wraps but never forwards a
//! schema change: each mutation only renders its statement with the given
//! dialect and returns it. A migration run through it produces the full
//! statement list in its report and leaves the schema untouched.

use async_trait::async_trait;
use tracing::info;

use crate::catalog::Catalog;
use crate::dialect::KeyDialect;
use crate::editor::SchemaEditor;
use crate::error::Result;
use crate::schema::{
    ColumnAttributes, ColumnType, ConstraintRules, ForeignKeyDefinition, ReferencingColumn,
    TargetKey,
};

/// Runs a migration against `inner` without executing DDL.
pub struct DryRun<'a, D: ?Sized> {
    inner: &'a D,
    dialect: &'a dyn KeyDialect,
}

impl<'a, D: ?Sized> DryRun<'a, D> {
    /// Wraps `inner`, rendering statements with `dialect`.
    pub fn new(inner: &'a D, dialect: &'a dyn KeyDialect) -> Self {
        Self { inner, dialect }
    }

    fn plan(&self, sql: String) -> String {
        info!(sql = %sql, "Dry run, not executing");
        sql
    }
}

#[async_trait]
impl<D> Catalog for DryRun<'_, D>
where
    D: Catalog + ?Sized,
{
    async fn referencing_columns(&self, target: &TargetKey) -> Result<Vec<ReferencingColumn>> {
        self.inner.referencing_columns(target).await
    }

    async fn constraint_rules(&self, constraint_name: &str) -> Result<ConstraintRules> {
        self.inner.constraint_rules(constraint_name).await
    }

    async fn column_attributes(&self, table: &str, column: &str) -> Result<ColumnAttributes> {
        self.inner.column_attributes(table, column).await
    }
}

#[async_trait]
impl<D> SchemaEditor for DryRun<'_, D>
where
    D: SchemaEditor + ?Sized,
{
    async fn drop_foreign_key(&self, table: &str, constraint_name: &str) -> Result<String> {
        Ok(self.plan(self.dialect.drop_foreign_key_sql(table, constraint_name)))
    }

    async fn alter_column_type(
        &self,
        table: &str,
        column: &str,
        column_type: ColumnType,
        attributes: Option<&ColumnAttributes>,
    ) -> Result<String> {
        Ok(self.plan(
            self.dialect
                .alter_column_sql(table, column, column_type, attributes),
        ))
    }

    async fn add_foreign_key(&self, foreign_key: &ForeignKeyDefinition) -> Result<String> {
        Ok(self.plan(self.dialect.add_foreign_key_sql(foreign_key)))
    }

    // The lock is still taken so a dry run never races a real one.
    async fn acquire_lock(&self, name: &str) -> Result<()> {
        self.inner.acquire_lock(name).await
    }

    async fn release_lock(&self, name: &str) -> Result<()> {
        self.inner.release_lock(name).await
    }
}
