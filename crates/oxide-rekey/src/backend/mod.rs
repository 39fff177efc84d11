//! Database backends implementing [`Catalog`](crate::catalog::Catalog) and
//! [`SchemaEditor`](crate::editor::SchemaEditor).

mod mysql;

pub use mysql::MySqlBackend;
