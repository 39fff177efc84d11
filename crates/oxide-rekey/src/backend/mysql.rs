//! MySQL backend.
//!
//! Reads `information_schema` for the database selected by the connection
//! (`DATABASE()`) and runs DDL over a single connection. MySQL commits DDL
//! implicitly, so nothing here is wrapped in a transaction. Wrap the backend
//! in [`DryRun`](crate::dry_run::DryRun) to list statements without running
//! them.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use sqlx::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use crate::catalog::Catalog;
use crate::dialect::{KeyDialect, MySqlDialect};
use crate::editor::SchemaEditor;
use crate::error::{MigrateError, Result};
use crate::schema::{
    ColumnAttributes, ColumnType, ConstraintRules, ForeignKeyAction, ForeignKeyDefinition,
    ReferencingColumn, TargetKey,
};

// CAST to CHAR: some servers report information_schema text as binary.
const REFERENCING_COLUMNS_SQL: &str = r#"
SELECT
    CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME,
    CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
    CAST(CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME
FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
WHERE REFERENCED_TABLE_SCHEMA = DATABASE()
  AND REFERENCED_TABLE_NAME = ?
  AND REFERENCED_COLUMN_NAME = ?
ORDER BY TABLE_NAME, CONSTRAINT_NAME
"#;

const CONSTRAINT_RULES_SQL: &str = r#"
SELECT
    CAST(UPDATE_RULE AS CHAR(32)) AS UPDATE_RULE,
    CAST(DELETE_RULE AS CHAR(32)) AS DELETE_RULE
FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS
WHERE CONSTRAINT_SCHEMA = DATABASE()
  AND CONSTRAINT_NAME = ?
"#;

const COLUMN_ATTRIBUTES_SQL: &str = r#"
SELECT
    CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS CHARACTER_MAXIMUM_LENGTH,
    CAST(IS_NULLABLE AS CHAR(3)) AS IS_NULLABLE,
    CAST(COLLATION_NAME AS CHAR(64)) AS COLLATION_NAME
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_SCHEMA = DATABASE()
  AND TABLE_NAME = ?
  AND COLUMN_NAME = ?
"#;

/// Default time to wait for the advisory lock.
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// MySQL catalog and schema editor over one connection.
pub struct MySqlBackend {
    conn: Mutex<MySqlConnection>,
    dialect: MySqlDialect,
    lock_timeout: Duration,
}

impl MySqlBackend {
    /// Wraps an open connection.
    pub fn new(conn: MySqlConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
            dialect: MySqlDialect::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Opens a connection to `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let conn = MySqlConnection::connect(url).await?;
        Ok(Self::new(conn))
    }

    /// Sets how long to wait for the advisory lock.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &MySqlDialect {
        &self.dialect
    }

    /// Closes the underlying connection.
    pub async fn close(self) -> Result<()> {
        self.conn.into_inner().close().await?;
        Ok(())
    }

    async fn execute(&self, sql: String) -> Result<String> {
        debug!(sql = %sql, "Executing SQL");
        let mut conn = self.conn.lock().await;
        sqlx::query(&sql).execute(&mut *conn).await?;
        Ok(sql)
    }
}

#[async_trait]
impl Catalog for MySqlBackend {
    async fn referencing_columns(&self, target: &TargetKey) -> Result<Vec<ReferencingColumn>> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<(String, String, String)> = sqlx::query_as(REFERENCING_COLUMNS_SQL)
            .bind(&target.table)
            .bind(&target.column)
            .fetch_all(&mut *conn)
            .await?;

        debug!(
            target_key = %target,
            count = rows.len(),
            "Loaded referencing foreign keys"
        );

        Ok(rows
            .into_iter()
            .map(|(table, column, constraint)| ReferencingColumn::new(table, column, constraint))
            .collect())
    }

    async fn constraint_rules(&self, constraint_name: &str) -> Result<ConstraintRules> {
        let mut conn = self.conn.lock().await;
        let row: Option<(String, String)> = sqlx::query_as(CONSTRAINT_RULES_SQL)
            .bind(constraint_name)
            .fetch_optional(&mut *conn)
            .await?;

        let (update_rule, delete_rule) = row.ok_or_else(|| MigrateError::RuleLookup {
            constraint: constraint_name.to_string(),
        })?;

        Ok(ConstraintRules::new(
            update_rule.parse::<ForeignKeyAction>()?,
            delete_rule.parse::<ForeignKeyAction>()?,
        ))
    }

    async fn column_attributes(&self, table: &str, column: &str) -> Result<ColumnAttributes> {
        let mut conn = self.conn.lock().await;
        let row: Option<(Option<i64>, String, Option<String>)> = sqlx::query_as(COLUMN_ATTRIBUTES_SQL)
            .bind(table)
            .bind(column)
            .fetch_optional(&mut *conn)
            .await?;

        let (max_length, is_nullable, collation) = row.ok_or_else(|| MigrateError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        })?;

        Ok(ColumnAttributes::new(
            max_length.and_then(|len| u32::try_from(len).ok()),
            is_nullable.eq_ignore_ascii_case("YES"),
        )
        .with_collation(collation))
    }
}

#[async_trait]
impl SchemaEditor for MySqlBackend {
    async fn drop_foreign_key(&self, table: &str, constraint_name: &str) -> Result<String> {
        let sql = self.dialect.drop_foreign_key_sql(table, constraint_name);
        self.execute(sql).await
    }

    async fn alter_column_type(
        &self,
        table: &str,
        column: &str,
        column_type: ColumnType,
        attributes: Option<&ColumnAttributes>,
    ) -> Result<String> {
        let sql = self
            .dialect
            .alter_column_sql(table, column, column_type, attributes);
        self.execute(sql).await
    }

    async fn add_foreign_key(&self, foreign_key: &ForeignKeyDefinition) -> Result<String> {
        let sql = self.dialect.add_foreign_key_sql(foreign_key);
        self.execute(sql).await
    }

    async fn acquire_lock(&self, name: &str) -> Result<()> {
        let timeout = i64::try_from(self.lock_timeout.as_secs()).unwrap_or(i64::MAX);
        let mut conn = self.conn.lock().await;
        let (granted,): (Option<i64>,) = sqlx::query_as("SELECT GET_LOCK(?, ?)")
            .bind(name)
            .bind(timeout)
            .fetch_one(&mut *conn)
            .await?;

        if granted != Some(1) {
            return Err(MigrateError::LockUnavailable(name.to_string()));
        }

        debug!(lock = %name, "Acquired migration lock");
        Ok(())
    }

    async fn release_lock(&self, name: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        sqlx::query("SELECT RELEASE_LOCK(?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        debug!(lock = %name, "Released migration lock");
        Ok(())
    }
}
