#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use oxide_rekey::prelude::*;

/// A column as the in-memory database stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub column_type: ColumnType,
    pub nullable: bool,
    pub max_length: Option<u32>,
}

impl Column {
    pub fn key(column_type: ColumnType) -> Self {
        Self {
            column_type,
            nullable: false,
            max_length: None,
        }
    }

    pub fn new(column_type: ColumnType, nullable: bool) -> Self {
        let max_length = column_type.takes_length().then_some(255);
        Self {
            column_type,
            nullable,
            max_length,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }
}

/// Everything the in-memory database knows about its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub columns: BTreeMap<ColumnRef, Column>,
    pub foreign_keys: BTreeMap<String, ForeignKeyDefinition>,
}

#[derive(Debug, Default)]
struct Inner {
    schema: Schema,
    statements: Vec<String>,
    catalog_reads: usize,
    fail_on: Option<String>,
    hidden_rules: BTreeSet<String>,
    refuse_lock: bool,
    lock_held: Option<String>,
    locks_taken: usize,
}

/// An in-memory database that enforces the MySQL rules a key retype runs
/// into: a column taking part in a foreign key cannot change type, and a
/// foreign key needs matching column types on both ends.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    inner: Mutex<Inner>,
    dialect: MySqlDialect,
}

/// Storage class MySQL compares when checking foreign key compatibility.
fn storage_class(column_type: ColumnType) -> ColumnType {
    match column_type {
        ColumnType::Increments => ColumnType::UnsignedInteger,
        ColumnType::BigIncrements => ColumnType::UnsignedBigInteger,
        ColumnType::SmallIncrements => ColumnType::UnsignedSmallInteger,
        ColumnType::MediumIncrements => ColumnType::UnsignedMediumInteger,
        ColumnType::Uuid => ColumnType::Char,
        other => other,
    }
}

fn db_error(message: impl Into<String>) -> MigrateError {
    MigrateError::Database(sqlx::Error::Protocol(message.into()))
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(self, table: &str, column: &str, definition: Column) -> Self {
        self.inner
            .lock()
            .unwrap()
            .schema
            .columns
            .insert(ColumnRef::new(table, column), definition);
        self
    }

    pub fn with_foreign_key(
        self,
        name: &str,
        table: &str,
        column: &str,
        references: (&str, &str),
        on_delete: ForeignKeyAction,
        on_update: ForeignKeyAction,
    ) -> Self {
        let fk = ForeignKeyDefinition {
            name: name.to_string(),
            table: table.to_string(),
            column: column.to_string(),
            references_table: references.0.to_string(),
            references_column: references.1.to_string(),
            on_delete,
            on_update,
        };
        self.inner
            .lock()
            .unwrap()
            .schema
            .foreign_keys
            .insert(name.to_string(), fk);
        self
    }

    /// Makes the first statement containing `fragment` fail.
    pub fn fail_on(self, fragment: &str) -> Self {
        self.inner.lock().unwrap().fail_on = Some(fragment.to_string());
        self
    }

    /// Makes the rules of `constraint` unreadable, as if it vanished after
    /// discovery.
    pub fn hide_rules(self, constraint: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .hidden_rules
            .insert(constraint.to_string());
        self
    }

    pub fn refuse_lock(self) -> Self {
        self.inner.lock().unwrap().refuse_lock = true;
        self
    }

    pub fn schema(&self) -> Schema {
        self.inner.lock().unwrap().schema.clone()
    }

    pub fn column(&self, table: &str, column: &str) -> Column {
        self.inner.lock().unwrap().schema.columns[&ColumnRef::new(table, column)].clone()
    }

    pub fn foreign_key(&self, name: &str) -> Option<ForeignKeyDefinition> {
        self.inner
            .lock()
            .unwrap()
            .schema
            .foreign_keys
            .get(name)
            .cloned()
    }

    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().unwrap().statements.clone()
    }

    pub fn catalog_reads(&self) -> usize {
        self.inner.lock().unwrap().catalog_reads
    }

    pub fn lock_held(&self) -> Option<String> {
        self.inner.lock().unwrap().lock_held.clone()
    }

    pub fn locks_taken(&self) -> usize {
        self.inner.lock().unwrap().locks_taken
    }

    fn check_failure(inner: &mut Inner, sql: &str) -> Result<()> {
        let hit = inner
            .fail_on
            .as_deref()
            .is_some_and(|fragment| sql.contains(fragment));
        if hit {
            inner.fail_on = None;
            return Err(db_error(format!("injected failure: {sql}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryDatabase {
    async fn referencing_columns(&self, target: &TargetKey) -> Result<Vec<ReferencingColumn>> {
        let mut inner = self.inner.lock().unwrap();
        inner.catalog_reads += 1;
        Ok(inner
            .schema
            .foreign_keys
            .values()
            .filter(|fk| {
                fk.references_table == target.table && fk.references_column == target.column
            })
            .map(|fk| ReferencingColumn::new(&fk.table, &fk.column, &fk.name))
            .collect())
    }

    async fn constraint_rules(&self, constraint_name: &str) -> Result<ConstraintRules> {
        let mut inner = self.inner.lock().unwrap();
        inner.catalog_reads += 1;
        if inner.hidden_rules.contains(constraint_name) {
            return Err(MigrateError::RuleLookup {
                constraint: constraint_name.to_string(),
            });
        }
        inner
            .schema
            .foreign_keys
            .get(constraint_name)
            .map(ForeignKeyDefinition::rules)
            .ok_or_else(|| MigrateError::RuleLookup {
                constraint: constraint_name.to_string(),
            })
    }

    async fn column_attributes(&self, table: &str, column: &str) -> Result<ColumnAttributes> {
        let mut inner = self.inner.lock().unwrap();
        inner.catalog_reads += 1;
        inner
            .schema
            .columns
            .get(&ColumnRef::new(table, column))
            .map(|c| ColumnAttributes::new(c.max_length, c.nullable))
            .ok_or_else(|| MigrateError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
    }
}

#[async_trait]
impl SchemaEditor for MemoryDatabase {
    async fn drop_foreign_key(&self, table: &str, constraint_name: &str) -> Result<String> {
        let sql = self.dialect.drop_foreign_key_sql(table, constraint_name);
        let mut inner = self.inner.lock().unwrap();
        Self::check_failure(&mut inner, &sql)?;

        match inner.schema.foreign_keys.get(constraint_name) {
            Some(fk) if fk.table == table => {}
            _ => return Err(db_error(format!("can't DROP '{constraint_name}'"))),
        }
        inner.schema.foreign_keys.remove(constraint_name);
        inner.statements.push(sql.clone());
        Ok(sql)
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
        let mut inner = self.inner.lock().unwrap();
        Self::check_failure(&mut inner, &sql)?;

        let in_use = inner.schema.foreign_keys.values().any(|fk| {
            (fk.table == table && fk.column == column)
                || (fk.references_table == table && fk.references_column == column)
        });
        if in_use {
            return Err(db_error(format!(
                "Cannot change column '{column}': used in a foreign key constraint"
            )));
        }

        let key = ColumnRef::new(table, column);
        let Some(existing) = inner.schema.columns.get_mut(&key) else {
            return Err(db_error(format!("Unknown column '{column}' in '{table}'")));
        };
        existing.column_type = column_type;
        existing.nullable = attributes.is_some_and(|a| a.nullable);
        existing.max_length = if column_type.takes_length() {
            Some(attributes.and_then(|a| a.max_length).unwrap_or(255))
        } else {
            None
        };

        inner.statements.push(sql.clone());
        Ok(sql)
    }

    async fn add_foreign_key(&self, foreign_key: &ForeignKeyDefinition) -> Result<String> {
        let sql = self.dialect.add_foreign_key_sql(foreign_key);
        let mut inner = self.inner.lock().unwrap();
        Self::check_failure(&mut inner, &sql)?;

        if inner.schema.foreign_keys.contains_key(&foreign_key.name) {
            return Err(db_error(format!("Duplicate foreign key '{}'", foreign_key.name)));
        }
        let child = inner
            .schema
            .columns
            .get(&ColumnRef::new(&foreign_key.table, &foreign_key.column));
        let parent = inner.schema.columns.get(&ColumnRef::new(
            &foreign_key.references_table,
            &foreign_key.references_column,
        ));
        match (child, parent) {
            (Some(child), Some(parent))
                if storage_class(child.column_type) == storage_class(parent.column_type) => {}
            _ => {
                return Err(db_error(format!(
                    "Referencing column '{}' and referenced column '{}' in foreign key '{}' are incompatible",
                    foreign_key.column, foreign_key.references_column, foreign_key.name
                )));
            }
        }

        inner
            .schema
            .foreign_keys
            .insert(foreign_key.name.clone(), foreign_key.clone());
        inner.statements.push(sql.clone());
        Ok(sql)
    }

    async fn acquire_lock(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.refuse_lock || inner.lock_held.is_some() {
            return Err(MigrateError::LockUnavailable(name.to_string()));
        }
        inner.lock_held = Some(name.to_string());
        inner.locks_taken += 1;
        Ok(())
    }

    async fn release_lock(&self, _name: &str) -> Result<()> {
        self.inner.lock().unwrap().lock_held = None;
        Ok(())
    }
}

/// `users(id)` referenced by `posts(user_id)`, ON DELETE CASCADE ON UPDATE RESTRICT.
pub fn users_and_posts() -> MemoryDatabase {
    MemoryDatabase::new()
        .with_column("users", "id", Column::key(ColumnType::Increments))
        .with_column("posts", "id", Column::key(ColumnType::Increments))
        .with_column("posts", "user_id", Column::new(ColumnType::UnsignedInteger, false))
        .with_foreign_key(
            "posts_user_id_foreign",
            "posts",
            "user_id",
            ("users", "id"),
            ForeignKeyAction::Cascade,
            ForeignKeyAction::Restrict,
        )
}

/// `users(id)` referenced by posts, comments (nullable, SET NULL) and a
/// self-referencing `users.invited_by`.
pub fn blog() -> MemoryDatabase {
    users_and_posts()
        .with_column("users", "invited_by", Column::new(ColumnType::UnsignedInteger, true))
        .with_column("comments", "id", Column::key(ColumnType::Increments))
        .with_column("comments", "author_id", Column::new(ColumnType::UnsignedInteger, true))
        .with_column("comments", "post_id", Column::new(ColumnType::UnsignedInteger, false))
        .with_foreign_key(
            "comments_author_id_foreign",
            "comments",
            "author_id",
            ("users", "id"),
            ForeignKeyAction::SetNull,
            ForeignKeyAction::Cascade,
        )
        .with_foreign_key(
            "users_invited_by_foreign",
            "users",
            "invited_by",
            ("users", "id"),
            ForeignKeyAction::NoAction,
            ForeignKeyAction::NoAction,
        )
        // Unrelated foreign key that must be left alone.
        .with_foreign_key(
            "comments_post_id_foreign",
            "comments",
            "post_id",
            ("posts", "id"),
            ForeignKeyAction::Cascade,
            ForeignKeyAction::Cascade,
        )
}

pub fn widen_users_id() -> KeyTypeMigrator {
    KeyTypeMigrator::new(
        TargetKey::new("users", "id"),
        TypeMapping::new(ColumnType::Increments, ColumnType::UnsignedInteger),
        TypeMapping::new(ColumnType::BigIncrements, ColumnType::UnsignedBigInteger),
    )
}
