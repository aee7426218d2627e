//! Local entity store
//!
//! Shared SQLite database holding the reconciled entities. Raw SQL with
//! natural-key upserts; every natural key is unique per tenant, never
//! globally. Schema is created on pool initialization.

pub mod analysis;
pub mod carts;
pub mod customers;
pub mod jobs;
pub mod leads;
pub mod orders;
pub mod tenants;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

/// Timestamps are stored as RFC3339 text
pub(crate) fn parse_ts(raw: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Failed to parse timestamp '{raw}': {e}")))
}

pub(crate) fn parse_ts_opt(raw: Option<String>) -> crate::Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

pub(crate) fn parse_uuid(raw: &str) -> crate::Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| crate::Error::Internal(format!("Failed to parse id '{raw}': {e}")))
}

/// Initialize database connection pool, creating the file and schema as
/// needed.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create all tables if they don't exist. Also used by tests on
/// `sqlite::memory:` pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1,
            db_host TEXT NOT NULL DEFAULT '',
            db_port INTEGER NOT NULL DEFAULT 3306,
            db_name TEXT NOT NULL DEFAULT '',
            db_user TEXT NOT NULL DEFAULT '',
            db_password TEXT NOT NULL DEFAULT '',
            table_prefix TEXT NOT NULL DEFAULT 'wp_',
            lead_field_name TEXT NOT NULL DEFAULT 'Nome_3',
            lead_field_phone TEXT NOT NULL DEFAULT 'Whatsapp_8',
            lead_field_detail TEXT NOT NULL DEFAULT '',
            msg_template_lead TEXT NOT NULL DEFAULT '',
            msg_template_cart TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            first_name TEXT,
            last_name TEXT,
            status TEXT NOT NULL DEFAULT 'never_bought',
            score INTEGER NOT NULL DEFAULT 0,
            total_orders INTEGER NOT NULL DEFAULT 0,
            completed_orders INTEGER NOT NULL DEFAULT 0,
            total_spent REAL NOT NULL DEFAULT 0,
            average_order_value REAL NOT NULL DEFAULT 0,
            total_carts INTEGER NOT NULL DEFAULT 0,
            abandoned_carts INTEGER NOT NULL DEFAULT 0,
            recovered_carts INTEGER NOT NULL DEFAULT 0,
            total_abandoned_value REAL NOT NULL DEFAULT 0,
            first_seen TEXT,
            first_purchase TEXT,
            last_purchase TEXT,
            last_cart_abandoned TEXT,
            last_activity TEXT NOT NULL,
            days_since_last_purchase INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(tenant_id, email)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS carts (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            checkout_id TEXT NOT NULL,
            session_id TEXT,
            cart_contents TEXT NOT NULL DEFAULT '[]',
            cart_total REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            items_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            abandoned_at TEXT,
            was_recovered INTEGER NOT NULL DEFAULT 0,
            recovered_order_id TEXT,
            recovered_at TEXT,
            recovery_value REAL NOT NULL DEFAULT 0,
            recovery_email_sent INTEGER NOT NULL DEFAULT 0,
            recovery_email_sent_at TEXT,
            recovery_whatsapp_sent INTEGER NOT NULL DEFAULT 0,
            recovery_whatsapp_sent_at TEXT,
            recovery_attempts INTEGER NOT NULL DEFAULT 0,
            UNIQUE(tenant_id, checkout_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            order_id TEXT NOT NULL,
            order_number TEXT NOT NULL,
            total REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            UNIQUE(tenant_id, order_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            form_id TEXT NOT NULL,
            name TEXT,
            phone TEXT,
            detail TEXT,
            ip_address TEXT,
            status TEXT NOT NULL DEFAULT 'new',
            is_customer INTEGER NOT NULL DEFAULT 0,
            customer_id TEXT,
            captured_at TEXT NOT NULL,
            UNIQUE(tenant_id, form_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customer_analysis (
            tenant_id TEXT NOT NULL,
            date TEXT NOT NULL,
            total_customers INTEGER NOT NULL DEFAULT 0,
            new_customers INTEGER NOT NULL DEFAULT 0,
            never_bought INTEGER NOT NULL DEFAULT 0,
            first_time INTEGER NOT NULL DEFAULT 0,
            returning_customers INTEGER NOT NULL DEFAULT 0,
            abandoned_only INTEGER NOT NULL DEFAULT 0,
            inactive INTEGER NOT NULL DEFAULT 0,
            vip INTEGER NOT NULL DEFAULT 0,
            total_carts INTEGER NOT NULL DEFAULT 0,
            abandoned_carts INTEGER NOT NULL DEFAULT 0,
            recovered_carts INTEGER NOT NULL DEFAULT 0,
            total_revenue REAL NOT NULL DEFAULT 0,
            abandoned_value REAL NOT NULL DEFAULT 0,
            avg_order_value REAL NOT NULL DEFAULT 0,
            conversion_rate REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(tenant_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_jobs (
            job_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            status TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            snapshot TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_tables(&pool).await.expect("Failed to init tables");
    pool
}
