use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables, indexes, and triggers. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            display_name TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decisions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL CHECK (length(trim(title)) > 0),
            description TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decision_items (
            id TEXT PRIMARY KEY,
            decision_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            item_type TEXT NOT NULL CHECK (item_type IN ('pro', 'con')),
            created_at INTEGER NOT NULL,
            FOREIGN KEY (decision_id) REFERENCES decisions(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // New users get a profile row automatically. The id is a hyphenated
    // UUID v4, the same format `store::new_id` produces.
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_users_create_profile
        AFTER INSERT ON users
        BEGIN
            INSERT INTO profiles (id, user_id, display_name, created_at, updated_at)
            VALUES (
                lower(hex(randomblob(4))) || '-' ||
                lower(hex(randomblob(2))) || '-4' ||
                substr(lower(hex(randomblob(2))), 2) || '-' ||
                substr('89ab', 1 + (abs(random()) % 4), 1) ||
                substr(lower(hex(randomblob(2))), 2) || '-' ||
                lower(hex(randomblob(6))),
                NEW.id, NULL, NEW.created_at, NEW.created_at
            );
        END
        "#,
    )
    .execute(pool)
    .await?;

    // updated_at refresh. Recursive triggers are off in SQLite, so the inner
    // UPDATE does not re-fire these.
    for table in ["decisions", "profiles"] {
        sqlx::query(&format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS trg_{table}_touch
            AFTER UPDATE ON {table}
            FOR EACH ROW
            WHEN NEW.updated_at = OLD.updated_at
            BEGIN
                UPDATE {table} SET updated_at = CAST(strftime('%s', 'now') AS INTEGER)
                WHERE id = NEW.id;
            END
            "#
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_user ON decisions(user_id, created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_items_decision ON decision_items(decision_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
