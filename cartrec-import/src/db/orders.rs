//! Order persistence
//!
//! Upserts key on `(tenant_id, order_id)`. Status and total refresh on
//! re-import; everything else is immutable once seen.

use crate::models::Order;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_ts, parse_uuid};

pub async fn save_order(pool: &SqlitePool, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, tenant_id, customer_id, order_id, order_number, total, status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(tenant_id, order_id) DO UPDATE SET
            total = excluded.total,
            status = excluded.status
        "#,
    )
    .bind(order.id.to_string())
    .bind(order.tenant_id.to_string())
    .bind(order.customer_id.to_string())
    .bind(&order.order_id)
    .bind(&order.order_number)
    .bind(order.total)
    .bind(&order.status)
    .bind(order.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn order_exists(pool: &SqlitePool, tenant_id: Uuid, order_id: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE tenant_id = ? AND order_id = ?")
            .bind(tenant_id.to_string())
            .bind(order_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn load_orders_for_customer(pool: &SqlitePool, customer_id: Uuid) -> Result<Vec<Order>> {
    let rows = sqlx::query(
        r#"
        SELECT id, tenant_id, customer_id, order_id, order_number, total, status, created_at
        FROM orders
        WHERE customer_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(customer_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_order).collect()
}

/// Orders of a customer strictly inside `(after, until]`, earliest first.
/// Candidates for recovery attribution; the status filter is applied by the
/// caller because the source status vocabulary is open-ended.
pub async fn load_orders_in_window(
    pool: &SqlitePool,
    customer_id: Uuid,
    after: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<Order>> {
    let rows = sqlx::query(
        r#"
        SELECT id, tenant_id, customer_id, order_id, order_number, total, status, created_at
        FROM orders
        WHERE customer_id = ? AND created_at > ? AND created_at <= ?
        ORDER BY created_at
        "#,
    )
    .bind(customer_id.to_string())
    .bind(after.to_rfc3339())
    .bind(until.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_order).collect()
}

fn row_to_order(row: sqlx::sqlite::SqliteRow) -> Result<Order> {
    let id: String = row.get("id");
    let tenant_id: String = row.get("tenant_id");
    let customer_id: String = row.get("customer_id");
    let created_at: String = row.get("created_at");

    Ok(Order {
        id: parse_uuid(&id)?,
        tenant_id: parse_uuid(&tenant_id)?,
        customer_id: parse_uuid(&customer_id)?,
        order_id: row.get("order_id"),
        order_number: row.get("order_number"),
        total: row.get("total"),
        status: row.get("status"),
        created_at: parse_ts(&created_at)?,
    })
}
