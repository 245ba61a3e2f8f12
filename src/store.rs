//! Decision, item, and profile persistence.
//!
//! Every operation takes the calling user's id and filters on it, so a row
//! owned by someone else is indistinguishable from a missing one. Cascading
//! deletes and the `pro`/`con` constraint are enforced by the schema in
//! [`crate::migrate`].

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Decision, DecisionItem, ItemType, Profile};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn non_empty(value: &str, what: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn profile_from_row(row: &SqliteRow) -> Profile {
    Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn decision_from_row(row: &SqliteRow) -> Decision {
    Decision {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn item_from_row(row: &SqliteRow) -> StoreResult<DecisionItem> {
    let raw_type: String = row.get("item_type");
    Ok(DecisionItem {
        id: row.get("id"),
        decision_id: row.get("decision_id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        item_type: raw_type.parse().map_err(StoreError::Invalid)?,
        created_at: row.get("created_at"),
    })
}

// ============ Users & profiles ============

/// Create a user. The profile row is provisioned by a database trigger.
pub async fn register_user(pool: &SqlitePool, display_name: Option<&str>) -> StoreResult<Profile> {
    let user_id = new_id();
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO users (id, created_at) VALUES (?, ?)")
        .bind(&user_id)
        .bind(now())
        .execute(&mut *tx)
        .await?;

    if let Some(name) = optional_text(display_name) {
        sqlx::query("UPDATE profiles SET display_name = ? WHERE user_id = ?")
            .bind(name)
            .bind(&user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::info!(%user_id, "registered user");

    get_profile(pool, &user_id).await
}

pub async fn get_profile(pool: &SqlitePool, user_id: &str) -> StoreResult<Profile> {
    let row = sqlx::query(
        "SELECT id, user_id, display_name, created_at, updated_at FROM profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound("profile"))?;

    Ok(profile_from_row(&row))
}

async fn ensure_user(pool: &SqlitePool, user_id: &str) -> StoreResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(StoreError::NotFound("user"));
    }
    Ok(())
}

// ============ Decisions ============

pub async fn create_decision(
    pool: &SqlitePool,
    user_id: &str,
    title: &str,
    description: Option<&str>,
) -> StoreResult<Decision> {
    let title = non_empty(title, "title")?;
    ensure_user(pool, user_id).await?;

    let ts = now();
    let decision = Decision {
        id: new_id(),
        user_id: user_id.to_string(),
        title,
        description: optional_text(description),
        created_at: ts,
        updated_at: ts,
    };

    sqlx::query(
        "INSERT INTO decisions (id, user_id, title, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&decision.id)
    .bind(&decision.user_id)
    .bind(&decision.title)
    .bind(&decision.description)
    .bind(decision.created_at)
    .bind(decision.updated_at)
    .execute(pool)
    .await?;

    tracing::debug!(decision_id = %decision.id, %user_id, "created decision");
    Ok(decision)
}

/// The user's decisions, newest first.
pub async fn list_decisions(pool: &SqlitePool, user_id: &str) -> StoreResult<Vec<Decision>> {
    let rows = sqlx::query(
        "SELECT id, user_id, title, description, created_at, updated_at FROM decisions \
         WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(decision_from_row).collect())
}

pub async fn get_decision(pool: &SqlitePool, user_id: &str, id: &str) -> StoreResult<Decision> {
    let row = sqlx::query(
        "SELECT id, user_id, title, description, created_at, updated_at FROM decisions \
         WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound("decision"))?;

    Ok(decision_from_row(&row))
}

/// Replace a decision's title and description. `updated_at` is refreshed
/// by the schema trigger.
pub async fn update_decision(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
    title: &str,
    description: Option<&str>,
) -> StoreResult<Decision> {
    let title = non_empty(title, "title")?;

    let result =
        sqlx::query("UPDATE decisions SET title = ?, description = ? WHERE id = ? AND user_id = ?")
            .bind(&title)
            .bind(optional_text(description))
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("decision"));
    }

    get_decision(pool, user_id, id).await
}

/// Delete a decision; its items go with it.
pub async fn delete_decision(pool: &SqlitePool, user_id: &str, id: &str) -> StoreResult<()> {
    let result = sqlx::query("DELETE FROM decisions WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("decision"));
    }
    tracing::debug!(decision_id = %id, %user_id, "deleted decision");
    Ok(())
}

// ============ Items ============

pub async fn add_item(
    pool: &SqlitePool,
    user_id: &str,
    decision_id: &str,
    item_type: ItemType,
    content: &str,
) -> StoreResult<DecisionItem> {
    let mut items = insert_items(pool, user_id, decision_id, &[(item_type, content.to_string())])
        .await?;
    items.pop().ok_or(StoreError::NotFound("item"))
}

/// Insert several items in one transaction: all of them are stored or none.
pub async fn insert_items(
    pool: &SqlitePool,
    user_id: &str,
    decision_id: &str,
    items: &[(ItemType, String)],
) -> StoreResult<Vec<DecisionItem>> {
    // Ownership check doubles as the existence check.
    get_decision(pool, user_id, decision_id).await?;

    let prepared = items
        .iter()
        .map(|(item_type, content)| -> StoreResult<DecisionItem> {
            Ok(DecisionItem {
                id: new_id(),
                decision_id: decision_id.to_string(),
                user_id: user_id.to_string(),
                content: non_empty(content, "item content")?,
                item_type: *item_type,
                created_at: now(),
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let mut tx = pool.begin().await?;
    for item in &prepared {
        sqlx::query(
            "INSERT INTO decision_items (id, decision_id, user_id, content, item_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.decision_id)
        .bind(&item.user_id)
        .bind(&item.content)
        .bind(item.item_type.as_str())
        .bind(item.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::debug!(%decision_id, count = prepared.len(), "inserted items");
    Ok(prepared)
}

/// Items of a decision in insertion order.
pub async fn list_items(
    pool: &SqlitePool,
    user_id: &str,
    decision_id: &str,
) -> StoreResult<Vec<DecisionItem>> {
    let rows = sqlx::query(
        "SELECT id, decision_id, user_id, content, item_type, created_at FROM decision_items \
         WHERE decision_id = ? AND user_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(decision_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(item_from_row).collect()
}

pub async fn delete_item(
    pool: &SqlitePool,
    user_id: &str,
    decision_id: &str,
    item_id: &str,
) -> StoreResult<()> {
    let result =
        sqlx::query("DELETE FROM decision_items WHERE id = ? AND decision_id = ? AND user_id = ?")
            .bind(item_id)
            .bind(decision_id)
            .bind(user_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("item"));
    }
    Ok(())
}
