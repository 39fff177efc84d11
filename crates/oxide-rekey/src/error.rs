//! Error types for key type migrations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ForeignKeyDefinition;

/// Stage of a key type migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Discovery of referencing foreign keys, rule capture, pre-flight reads.
    Inspect,
    /// Dropping the referencing foreign keys.
    Remove,
    /// Changing column types.
    Rewrite,
    /// Recreating the foreign keys.
    Restore,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inspect => "inspect",
            Self::Remove => "remove",
            Self::Rewrite => "rewrite",
            Self::Restore => "restore",
        })
    }
}

/// Errors that can occur while retyping a key.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A constraint listed by discovery has no rules in the catalog.
    #[error("Foreign key rules for constraint '{constraint}' not found")]
    RuleLookup {
        /// The constraint that vanished.
        constraint: String,
    },

    /// A column has no entry in the catalog.
    #[error("Column {table}.{column} not found")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// No rules were captured for a foreign key about to be restored.
    #[error("No captured rules for {table}.{column}; refusing to restore with unknown rules")]
    MissingCapturedRules {
        /// Referencing table.
        table: String,
        /// Referencing column.
        column: String,
    },

    /// The catalog reported a referential action this crate does not know.
    #[error("Unknown referential action: {0}")]
    UnknownRule(String),

    /// The advisory lock guarding the migration was not granted.
    #[error("Could not acquire migration lock '{0}'")]
    LockUnavailable(String),

    /// A run finished in a state that breaks a migration invariant.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Database error while reading the catalog or altering the schema.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A run aborted part way; the schema is left as the last successful
    /// statement produced it.
    #[error(
        "{phase} phase failed after dropping {dropped} and restoring {restored} foreign key(s): {source}"
    )]
    PhaseFailed {
        /// Phase that failed.
        phase: Phase,
        /// Foreign keys dropped before the failure.
        dropped: usize,
        /// Foreign keys restored before the failure.
        restored: usize,
        /// Dropped foreign keys not restored yet, with their captured rules.
        pending: Vec<ForeignKeyDefinition>,
        /// Underlying error.
        #[source]
        source: Box<MigrateError>,
    },
}

impl MigrateError {
    /// Returns the phase a run failed in, if this error aborted one.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::PhaseFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Returns the dropped foreign keys a failed run left unrestored.
    ///
    /// Each carries the rules captured before it was dropped, so it can be
    /// recreated by hand.
    #[must_use]
    pub fn pending(&self) -> &[ForeignKeyDefinition] {
        match self {
            Self::PhaseFailed { pending, .. } => pending,
            _ => &[],
        }
    }

    /// Returns the innermost error, unwrapping phase context.
    #[must_use]
    pub fn root(&self) -> &MigrateError {
        match self {
            Self::PhaseFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns whether the schema may have been left partially migrated.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        match self {
            Self::PhaseFailed { phase, dropped, .. } => *phase != Phase::Inspect || *dropped > 0,
            _ => false,
        }
    }
}

/// Result type for key type migrations.
pub type Result<T> = std::result::Result<T, MigrateError>;
