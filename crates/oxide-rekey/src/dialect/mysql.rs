//! MySQL dialect for key retypes.
//!
//! MySQL refuses to change the type of a column that takes part in a foreign
//! key, which is why every referencing constraint is dropped first. `MODIFY`
//! rewrites the whole column definition, so nullability and length have to be
//! spelled out again on every referencing column.

use crate::schema::{ColumnAttributes, ColumnType};

use super::KeyDialect;

/// MySQL dialect.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl KeyDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn type_name(&self, column_type: ColumnType, length: Option<u32>) -> String {
        column_type.mysql_name(length)
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn drop_foreign_key_sql(&self, table: &str, constraint_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(constraint_name)
        )
    }

    /// `MODIFY` replaces the whole definition: a DEFAULT or COMMENT on the
    /// column is lost. Collation is kept, since MySQL refuses a string foreign
    /// key whose collation differs from the referenced column's.
    fn alter_column_sql(
        &self,
        table: &str,
        column: &str,
        column_type: ColumnType,
        attributes: Option<&ColumnAttributes>,
    ) -> String {
        format!(
            "ALTER TABLE {} MODIFY {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            self.column_definition(column_type, attributes)
        )
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}
