//! Example: widening `users.id` in a blog schema
//!
//! Declares a key type migration for `users.id` and prints the statements it
//! would run against the database in `DATABASE_URL`, without executing them.
//!
//! Run with: cargo run --example widen_users_id -p oxide-rekey

use oxide_rekey::prelude::*;

/// Moves `users.id` from INT to BIGINT, along with `posts.user_id`,
/// `comments.author_id` and anything else referencing it.
struct WidenUsersId;

impl KeyTypeMigration for WidenUsersId {
    const TABLE: &'static str = "users";
    const COLUMN: &'static str = "id";
    const FROM: TypeMapping =
        TypeMapping::new(ColumnType::Increments, ColumnType::UnsignedInteger);
    const TO: TypeMapping =
        TypeMapping::new(ColumnType::BigIncrements, ColumnType::UnsignedBigInteger);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().without_time().init();

    let url = std::env::var("DATABASE_URL")?;
    let backend = MySqlBackend::connect(&url).await?;
    let db = DryRun::new(&backend, backend.dialect());

    println!("-- up");
    let report = WidenUsersId::up(&db).await?;
    for sql in &report.statements {
        println!("{sql};");
    }

    println!("\n-- down");
    let report = WidenUsersId::down(&db).await?;
    for sql in &report.statements {
        println!("{sql};");
    }

    backend.close().await?;
    Ok(())
}
