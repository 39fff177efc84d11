//! Key type migrator.
//!
//! This module changes the type of a primary key column while keeping every
//! foreign key that references it. A run is four phases over one connection:
//!
//! 1. inspect: discover referencing foreign keys, capture their rules and
//!    check every referencing column can be read
//! 2. remove: drop the referencing foreign keys
//! 3. rewrite: change the key column's type
//! 4. restore: retype each referencing column and recreate its foreign key
//!
//! DDL is not transactional on MySQL. A failure after the inspect phase leaves
//! the schema as the last successful statement produced it; the returned
//! [`MigrateError::PhaseFailed`] says where the run stopped and how many
//! constraints were dropped and restored by then, and carries the dropped
//! constraints still missing together with their captured rules. Recovery is
//! manual.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::editor::SchemaEditor;
use crate::error::{MigrateError, Phase, Result};
use crate::schema::{
    ColumnRef, ColumnType, ConstraintRules, Direction, ForeignKeyDefinition, ReferencingColumn,
    TargetKey, TypeMapping,
};

/// MySQL caps user lock names at 64 characters.
const MAX_LOCK_NAME_LEN: usize = 64;

/// Rules captured before the foreign keys are dropped, keyed by child column
/// and then by constraint name. One column may carry several foreign keys to
/// the key.
pub type CapturedRules = HashMap<ColumnRef, BTreeMap<String, ConstraintRules>>;

fn captured_rules<'a>(
    rules: &'a CapturedRules,
    column: &ReferencingColumn,
) -> Option<&'a ConstraintRules> {
    rules
        .get(&column.column_ref())
        .and_then(|by_name| by_name.get(&column.constraint_name))
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    /// Direction of the run.
    pub direction: Direction,
    /// The key that was retyped.
    pub target: TargetKey,
    /// Types applied to the key and its referencing columns.
    pub mapping: TypeMapping,
    /// Foreign keys the run recreates, with the rules captured before any drop.
    pub planned: Vec<ForeignKeyDefinition>,
    /// Foreign keys dropped, in drop order.
    pub dropped: Vec<ReferencingColumn>,
    /// Foreign keys recreated, in creation order.
    pub restored: Vec<ForeignKeyDefinition>,
    /// Statements executed (or, in dry-run mode, planned).
    pub statements: Vec<String>,
}

impl MigrationReport {
    fn new(direction: Direction, target: TargetKey, mapping: TypeMapping) -> Self {
        Self {
            direction,
            target,
            mapping,
            planned: Vec::new(),
            dropped: Vec::new(),
            restored: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Renders the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the planned foreign keys that were dropped but not restored.
    #[must_use]
    pub fn pending(&self) -> Vec<ForeignKeyDefinition> {
        let dropped: HashSet<&str> = self
            .dropped
            .iter()
            .map(|c| c.constraint_name.as_str())
            .collect();
        let restored: HashSet<&str> = self.restored.iter().map(|fk| fk.name.as_str()).collect();

        self.planned
            .iter()
            .filter(|fk| dropped.contains(fk.name.as_str()) && !restored.contains(fk.name.as_str()))
            .cloned()
            .collect()
    }

    fn fail(&self, phase: Phase, source: MigrateError) -> MigrateError {
        if matches!(source, MigrateError::PhaseFailed { .. }) {
            return source;
        }

        error!(
            target_key = %self.target,
            direction = %self.direction,
            phase = %phase,
            dropped = self.dropped.len(),
            restored = self.restored.len(),
            error = %source,
            "Key type migration aborted"
        );

        let pending = self.pending();
        for fk in &pending {
            error!(
                table = %fk.table,
                column = %fk.column,
                constraint = %fk.name,
                references_table = %fk.references_table,
                references_column = %fk.references_column,
                on_delete = %fk.on_delete,
                on_update = %fk.on_update,
                "Foreign key dropped and not restored"
            );
        }

        MigrateError::PhaseFailed {
            phase,
            dropped: self.dropped.len(),
            restored: self.restored.len(),
            pending,
            source: Box::new(source),
        }
    }
}

/// Retypes a key column and the columns referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTypeMigrator {
    target: TargetKey,
    from: TypeMapping,
    to: TypeMapping,
    lock: bool,
}

impl KeyTypeMigrator {
    /// Creates a migrator moving `target` between the `from` and `to` types.
    #[must_use]
    pub fn new(target: TargetKey, from: TypeMapping, to: TypeMapping) -> Self {
        Self {
            target,
            from,
            to,
            lock: true,
        }
    }

    /// Enables or disables the advisory lock around a run (enabled by default).
    #[must_use]
    pub fn with_lock(mut self, enabled: bool) -> Self {
        self.lock = enabled;
        self
    }

    /// Returns the key being retyped.
    #[must_use]
    pub fn target(&self) -> &TargetKey {
        &self.target
    }

    /// Returns the original types.
    #[must_use]
    pub fn from_mapping(&self) -> TypeMapping {
        self.from
    }

    /// Returns the target types.
    #[must_use]
    pub fn to_mapping(&self) -> TypeMapping {
        self.to
    }

    /// Returns the name of the advisory lock guarding this migration.
    #[must_use]
    pub fn lock_name(&self) -> String {
        let mut name = format!("oxide_rekey:{}", self.target);
        if name.len() > MAX_LOCK_NAME_LEN {
            let mut end = MAX_LOCK_NAME_LEN;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        name
    }

    /// Moves the key and its referencing columns to the `to` types.
    pub async fn up<D>(&self, db: &D) -> Result<MigrationReport>
    where
        D: Catalog + SchemaEditor,
    {
        self.run(db, Direction::Up).await
    }

    /// Moves the key and its referencing columns back to the `from` types.
    pub async fn down<D>(&self, db: &D) -> Result<MigrationReport>
    where
        D: Catalog + SchemaEditor,
    {
        self.run(db, Direction::Down).await
    }

    /// Runs the four phases in `direction`.
    pub async fn run<D>(&self, db: &D, direction: Direction) -> Result<MigrationReport>
    where
        D: Catalog + SchemaEditor,
    {
        if !self.lock {
            return self.run_unlocked(db, direction).await;
        }

        let lock_name = self.lock_name();
        db.acquire_lock(&lock_name).await?;

        let result = self.run_unlocked(db, direction).await;

        if let Err(e) = db.release_lock(&lock_name).await {
            warn!(lock = %lock_name, error = %e, "Failed to release migration lock");
        }

        result
    }

    async fn run_unlocked<D>(&self, db: &D, direction: Direction) -> Result<MigrationReport>
    where
        D: Catalog + SchemaEditor,
    {
        let mapping = direction.select(self.from, self.to);
        let mut report = MigrationReport::new(direction, self.target.clone(), mapping);

        info!(
            target_key = %self.target,
            direction = %direction,
            parent = %mapping.parent,
            child = %mapping.child,
            "Running key type migration"
        );

        let columns = self
            .get_referenced_tables(db)
            .await
            .map_err(|e| report.fail(Phase::Inspect, e))?;
        let rules = self
            .capture_rules(db, &columns)
            .await
            .map_err(|e| report.fail(Phase::Inspect, e))?;
        report.planned = columns
            .iter()
            .filter_map(|column| {
                captured_rules(&rules, column)
                    .map(|r| ForeignKeyDefinition::restore(column, &self.target, *r))
            })
            .collect();

        self.delete_foreigns(db, &columns, &rules, &mut report)
            .await
            .map_err(|e| report.fail(Phase::Remove, e))?;

        self.retype_parent(db, mapping.parent, &mut report)
            .await
            .map_err(|e| report.fail(Phase::Rewrite, e))?;

        self.add_foreigns(db, &columns, mapping.child, &rules, &mut report)
            .await?;

        if report.restored.len() != report.dropped.len() {
            let message = format!(
                "dropped {} foreign key(s) but restored {}",
                report.dropped.len(),
                report.restored.len()
            );
            return Err(report.fail(Phase::Restore, MigrateError::InvariantViolation(message)));
        }

        info!(
            target_key = %self.target,
            direction = %direction,
            foreign_keys = report.restored.len(),
            "Key type migration completed"
        );

        Ok(report)
    }

    /// Lists the foreign keys referencing the target key.
    pub async fn get_referenced_tables<C>(&self, catalog: &C) -> Result<Vec<ReferencingColumn>>
    where
        C: Catalog + ?Sized,
    {
        let columns = catalog.referencing_columns(&self.target).await?;
        if columns.is_empty() {
            info!(target_key = %self.target, "No foreign keys reference the key");
        } else {
            debug!(
                target_key = %self.target,
                count = columns.len(),
                "Discovered referencing foreign keys"
            );
        }
        Ok(columns)
    }

    /// Captures the rules of every referencing foreign key and checks each
    /// referencing column is readable, before anything is mutated.
    pub async fn capture_rules<C>(
        &self,
        catalog: &C,
        columns: &[ReferencingColumn],
    ) -> Result<CapturedRules>
    where
        C: Catalog + ?Sized,
    {
        let mut rules = CapturedRules::with_capacity(columns.len());
        for column in columns {
            let captured = catalog.constraint_rules(&column.constraint_name).await?;
            catalog
                .column_attributes(&column.table_name, &column.column_name)
                .await?;

            info!(
                constraint = %column.constraint_name,
                column = %column.column_ref(),
                on_update = %captured.on_update,
                on_delete = %captured.on_delete,
                "Captured foreign key rules"
            );

            rules
                .entry(column.column_ref())
                .or_default()
                .insert(column.constraint_name.clone(), captured);
        }
        Ok(rules)
    }

    /// Drops every referencing foreign key. Rules must already be captured.
    pub async fn delete_foreigns<E>(
        &self,
        editor: &E,
        columns: &[ReferencingColumn],
        rules: &CapturedRules,
        report: &mut MigrationReport,
    ) -> Result<()>
    where
        E: SchemaEditor + ?Sized,
    {
        for column in columns {
            if captured_rules(rules, column).is_none() {
                let key = column.column_ref();
                return Err(MigrateError::MissingCapturedRules {
                    table: key.table,
                    column: key.column,
                });
            }

            let sql = editor
                .drop_foreign_key(&column.table_name, &column.constraint_name)
                .await?;
            info!(
                table = %column.table_name,
                constraint = %column.constraint_name,
                "Dropped foreign key"
            );
            report.statements.push(sql);
            report.dropped.push(column.clone());
        }
        Ok(())
    }

    /// Changes the type of the key column itself.
    pub async fn retype_parent<E>(
        &self,
        editor: &E,
        column_type: ColumnType,
        report: &mut MigrationReport,
    ) -> Result<()>
    where
        E: SchemaEditor + ?Sized,
    {
        let sql = editor
            .alter_column_type(&self.target.table, &self.target.column, column_type, None)
            .await?;
        info!(column = %self.target, column_type = %column_type, "Retyped key column");
        report.statements.push(sql);
        Ok(())
    }

    /// Changes the type of a referencing column, keeping its nullability and
    /// length as currently found in the catalog.
    pub async fn retype_child<D>(
        &self,
        db: &D,
        column: &ReferencingColumn,
        column_type: ColumnType,
        report: &mut MigrationReport,
    ) -> Result<()>
    where
        D: Catalog + SchemaEditor + ?Sized,
    {
        let attributes = db
            .column_attributes(&column.table_name, &column.column_name)
            .await?;
        let sql = db
            .alter_column_type(
                &column.table_name,
                &column.column_name,
                column_type,
                Some(&attributes),
            )
            .await?;
        debug!(
            column = %column.column_ref(),
            column_type = %column_type,
            nullable = attributes.nullable,
            max_length = ?attributes.max_length,
            "Retyped referencing column"
        );
        report.statements.push(sql);
        Ok(())
    }

    /// Retypes each referencing column and recreates its foreign keys with the
    /// captured rules. A column carrying several foreign keys is retyped once.
    pub async fn add_foreigns<D>(
        &self,
        db: &D,
        columns: &[ReferencingColumn],
        child_type: ColumnType,
        rules: &CapturedRules,
        report: &mut MigrationReport,
    ) -> Result<()>
    where
        D: Catalog + SchemaEditor + ?Sized,
    {
        let mut retyped = HashSet::new();
        for column in columns {
            let key = column.column_ref();
            if !retyped.contains(&key) {
                self.retype_child(db, column, child_type, report)
                    .await
                    .map_err(|e| report.fail(Phase::Rewrite, e))?;
                retyped.insert(key.clone());
            }

            let captured = match captured_rules(rules, column) {
                Some(captured) => *captured,
                None => {
                    let err = MigrateError::MissingCapturedRules {
                        table: key.table,
                        column: key.column,
                    };
                    return Err(report.fail(Phase::Restore, err));
                }
            };

            let foreign_key = ForeignKeyDefinition::restore(column, &self.target, captured);
            let sql = db
                .add_foreign_key(&foreign_key)
                .await
                .map_err(|e| report.fail(Phase::Restore, e))?;
            info!(
                table = %foreign_key.table,
                constraint = %foreign_key.name,
                on_delete = %foreign_key.on_delete,
                on_update = %foreign_key.on_update,
                "Restored foreign key"
            );
            report.statements.push(sql);
            report.restored.push(foreign_key);
        }
        Ok(())
    }
}
