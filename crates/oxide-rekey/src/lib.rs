//! Primary key type migrations that keep their foreign keys.
//!
//! `oxide-rekey` widens (or narrows back) the storage type of a primary key
//! column, for example from a 32-bit to a 64-bit integer, without losing any
//! foreign key that references it:
//! - Foreign keys pointing at the key are discovered from the catalog
//! - Their update/delete rules are captured, then the constraints are dropped
//! - The key column and every referencing column are retyped, keeping the
//!   referencing columns' nullability and length
//! - The foreign keys are recreated with their original names and rules
//!
//! # Architecture
//!
//! - **Catalog** - Reads referencing foreign keys, rules and column shapes
//! - **SchemaEditor** - Drops/adds foreign keys and changes column types
//! - **Dialect** - Database-specific SQL generation
//! - **Migrator** - Runs the phases in order for either direction
//! - **Backend** - MySQL implementation of the catalog and editor over `sqlx`
//! - **DryRun** - Wrapper that renders statements instead of running them
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_rekey::prelude::*;
//!
//! pub struct WidenUsersId;
//!
//! impl KeyTypeMigration for WidenUsersId {
//!     const TABLE: &'static str = "users";
//!     const COLUMN: &'static str = "id";
//!     const FROM: TypeMapping =
//!         TypeMapping::new(ColumnType::Increments, ColumnType::UnsignedInteger);
//!     const TO: TypeMapping =
//!         TypeMapping::new(ColumnType::BigIncrements, ColumnType::UnsignedBigInteger);
//! }
//!
//! let db = MySqlBackend::connect("mysql://root@localhost/app").await?;
//! WidenUsersId::up(&db).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Widen users.id and everything referencing it
//! oxide-rekey up --table users --column id
//!
//! # Print the statements without running them
//! oxide-rekey up --table users --column id --dry-run
//!
//! # Move back to the original types
//! oxide-rekey down --table users --column id
//!
//! # List the foreign keys referencing users.id
//! oxide-rekey inspect --table users --column id
//! ```

use std::future::Future;

pub mod backend;
pub mod catalog;
pub mod dialect;
pub mod dry_run;
pub mod editor;
pub mod error;
pub mod migrator;
pub mod schema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::MySqlBackend;
    pub use crate::catalog::Catalog;
    pub use crate::dialect::{KeyDialect, MySqlDialect};
    pub use crate::dry_run::DryRun;
    pub use crate::editor::SchemaEditor;
    pub use crate::error::{MigrateError, Phase, Result};
    pub use crate::migrator::{CapturedRules, KeyTypeMigrator, MigrationReport};
    pub use crate::schema::{
        ColumnAttributes, ColumnRef, ColumnType, ConstraintRules, Direction, ForeignKeyAction,
        ForeignKeyDefinition, ReferencingColumn, TargetKey, TypeMapping,
    };
    pub use crate::KeyTypeMigration;
}

/// Trait for key type migrations defined in Rust code.
///
/// Implementors name the key and the types it moves between; `up` and `down`
/// run the migration in either direction.
pub trait KeyTypeMigration {
    /// Table owning the key (e.g., "users").
    const TABLE: &'static str;

    /// Key column (e.g., "id").
    const COLUMN: &'static str;

    /// Types before the migration (restored by `down`).
    const FROM: schema::TypeMapping;

    /// Types after the migration (applied by `up`).
    const TO: schema::TypeMapping;

    /// Converts to a migrator.
    fn to_migrator() -> migrator::KeyTypeMigrator {
        migrator::KeyTypeMigrator::new(
            schema::TargetKey::new(Self::TABLE, Self::COLUMN),
            Self::FROM,
            Self::TO,
        )
    }

    /// Applies the `TO` types.
    fn up<D>(db: &D) -> impl Future<Output = error::Result<migrator::MigrationReport>> + '_
    where
        D: catalog::Catalog + editor::SchemaEditor,
    {
        async move { Self::to_migrator().up(db).await }
    }

    /// Restores the `FROM` types.
    fn down<D>(db: &D) -> impl Future<Output = error::Result<migrator::MigrationReport>> + '_
    where
        D: catalog::Catalog + editor::SchemaEditor,
    {
        async move { Self::to_migrator().down(db).await }
    }
}
