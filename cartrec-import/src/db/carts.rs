//! Cart persistence
//!
//! Upserts key on `(tenant_id, checkout_id)`. A re-import refreshes the
//! source-owned columns but never touches recovery bookkeeping: once a cart
//! is marked recovered its status and attribution fields are final.

use crate::models::{Cart, CartStatus};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_ts, parse_ts_opt, parse_uuid};

const COLUMNS: &str = r#"
    id, tenant_id, customer_id, checkout_id, session_id, cart_contents,
    cart_total, status, items_count, created_at, abandoned_at,
    was_recovered, recovered_order_id, recovered_at, recovery_value,
    recovery_email_sent, recovery_email_sent_at,
    recovery_whatsapp_sent, recovery_whatsapp_sent_at, recovery_attempts
"#;

/// Save cart. On re-import the stored row keeps its recovery fields; the
/// incoming status only lands when the cart was not already recovered.
pub async fn save_cart(pool: &SqlitePool, cart: &Cart) -> Result<()> {
    let contents = serde_json::to_string(&cart.cart_contents)
        .map_err(|e| Error::Internal(format!("Failed to serialize cart contents: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO carts (
            id, tenant_id, customer_id, checkout_id, session_id, cart_contents,
            cart_total, status, items_count, created_at, abandoned_at,
            was_recovered, recovered_order_id, recovered_at, recovery_value,
            recovery_email_sent, recovery_email_sent_at,
            recovery_whatsapp_sent, recovery_whatsapp_sent_at, recovery_attempts
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(tenant_id, checkout_id) DO UPDATE SET
            customer_id = excluded.customer_id,
            session_id = excluded.session_id,
            cart_contents = excluded.cart_contents,
            cart_total = excluded.cart_total,
            status = CASE WHEN carts.was_recovered = 1
                          THEN carts.status ELSE excluded.status END,
            items_count = excluded.items_count,
            created_at = excluded.created_at,
            abandoned_at = excluded.abandoned_at
        "#,
    )
    .bind(cart.id.to_string())
    .bind(cart.tenant_id.to_string())
    .bind(cart.customer_id.to_string())
    .bind(&cart.checkout_id)
    .bind(&cart.session_id)
    .bind(contents)
    .bind(cart.cart_total)
    .bind(cart.status.as_str())
    .bind(cart.items_count)
    .bind(cart.created_at.to_rfc3339())
    .bind(cart.abandoned_at.map(|dt| dt.to_rfc3339()))
    .bind(cart.was_recovered)
    .bind(&cart.recovered_order_id)
    .bind(cart.recovered_at.map(|dt| dt.to_rfc3339()))
    .bind(cart.recovery_value)
    .bind(cart.recovery_email_sent)
    .bind(cart.recovery_email_sent_at.map(|dt| dt.to_rfc3339()))
    .bind(cart.recovery_whatsapp_sent)
    .bind(cart.recovery_whatsapp_sent_at.map(|dt| dt.to_rfc3339()))
    .bind(cart.recovery_attempts)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn cart_exists(pool: &SqlitePool, tenant_id: Uuid, checkout_id: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM carts WHERE tenant_id = ? AND checkout_id = ?")
            .bind(tenant_id.to_string())
            .bind(checkout_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Load one cart by its natural key
pub async fn load_cart(
    pool: &SqlitePool,
    tenant_id: Uuid,
    checkout_id: &str,
) -> Result<Option<Cart>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM carts WHERE tenant_id = ? AND checkout_id = ?"
    ))
    .bind(tenant_id.to_string())
    .bind(checkout_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_cart).transpose()
}

pub async fn load_carts_for_customer(pool: &SqlitePool, customer_id: Uuid) -> Result<Vec<Cart>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM carts WHERE customer_id = ? ORDER BY created_at"
    ))
    .bind(customer_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_cart).collect()
}

/// Carts still eligible for recovery attribution: active or abandoned, and
/// never previously attributed.
pub async fn load_recovery_candidates(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Cart>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {COLUMNS} FROM carts
        WHERE tenant_id = ?
          AND status IN ('active', 'abandoned')
          AND was_recovered = 0
        ORDER BY created_at
        "#
    ))
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_cart).collect()
}

/// Finalize a cart as recovered by the given order
pub async fn mark_recovered(
    pool: &SqlitePool,
    cart_id: Uuid,
    order_id: &str,
    recovered_at: DateTime<Utc>,
    recovery_value: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE carts
        SET status = 'recovered',
            was_recovered = 1,
            recovered_order_id = ?,
            recovered_at = ?,
            recovery_value = ?
        WHERE id = ?
        "#,
    )
    .bind(order_id)
    .bind(recovered_at.to_rfc3339())
    .bind(recovery_value)
    .bind(cart_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Finalize a cart as abandoned for good (recovery window elapsed)
pub async fn mark_abandoned(
    pool: &SqlitePool,
    cart_id: Uuid,
    abandoned_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE carts
        SET status = 'abandoned',
            abandoned_at = COALESCE(abandoned_at, ?)
        WHERE id = ?
        "#,
    )
    .bind(abandoned_at.to_rfc3339())
    .bind(cart_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_cart(row: sqlx::sqlite::SqliteRow) -> Result<Cart> {
    let id: String = row.get("id");
    let tenant_id: String = row.get("tenant_id");
    let customer_id: String = row.get("customer_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let contents: String = row.get("cart_contents");

    Ok(Cart {
        id: parse_uuid(&id)?,
        tenant_id: parse_uuid(&tenant_id)?,
        customer_id: parse_uuid(&customer_id)?,
        checkout_id: row.get("checkout_id"),
        session_id: row.get("session_id"),
        cart_contents: serde_json::from_str(&contents).unwrap_or_default(),
        cart_total: row.get("cart_total"),
        status: CartStatus::parse(&status).unwrap_or(CartStatus::Active),
        items_count: row.get("items_count"),
        created_at: parse_ts(&created_at)?,
        abandoned_at: parse_ts_opt(row.get("abandoned_at"))?,
        was_recovered: row.get("was_recovered"),
        recovered_order_id: row.get("recovered_order_id"),
        recovered_at: parse_ts_opt(row.get("recovered_at"))?,
        recovery_value: row.get("recovery_value"),
        recovery_email_sent: row.get("recovery_email_sent"),
        recovery_email_sent_at: parse_ts_opt(row.get("recovery_email_sent_at"))?,
        recovery_whatsapp_sent: row.get("recovery_whatsapp_sent"),
        recovery_whatsapp_sent_at: parse_ts_opt(row.get("recovery_whatsapp_sent_at"))?,
        recovery_attempts: row.get("recovery_attempts"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::extract::CartLine;
    use chrono::TimeZone;

    fn cart(tenant_id: Uuid, checkout_id: &str) -> Cart {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let mut cart = Cart::new(tenant_id, Uuid::new_v4(), checkout_id.into(), created);
        cart.cart_contents = vec![CartLine {
            product_id: 42,
            variation_id: None,
            quantity: 2,
        }];
        cart.cart_total = 150.0;
        cart.items_count = 2;
        cart
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let pool = test_pool().await;
        let tenant_id = Uuid::new_v4();

        let original = cart(tenant_id, "chk-1");
        save_cart(&pool, &original).await.unwrap();

        let loaded = load_cart(&pool, tenant_id, "chk-1")
            .await
            .unwrap()
            .expect("cart not found");
        assert_eq!(loaded.cart_total, 150.0);
        assert_eq!(loaded.cart_contents.len(), 1);
        assert_eq!(loaded.cart_contents[0].product_id, 42);
        assert!(!loaded.was_recovered);
    }

    #[tokio::test]
    async fn reimport_does_not_undo_recovery() {
        let pool = test_pool().await;
        let tenant_id = Uuid::new_v4();

        let original = cart(tenant_id, "chk-2");
        save_cart(&pool, &original).await.unwrap();

        let recovered_at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        mark_recovered(&pool, original.id, "1001", recovered_at, 150.0)
            .await
            .unwrap();

        // same source row arrives again on the next run, still "abandoned"
        let mut replay = cart(tenant_id, "chk-2");
        replay.status = CartStatus::Abandoned;
        save_cart(&pool, &replay).await.unwrap();

        let loaded = load_cart(&pool, tenant_id, "chk-2").await.unwrap().unwrap();
        assert_eq!(loaded.status, CartStatus::Recovered);
        assert!(loaded.was_recovered);
        assert_eq!(loaded.recovered_order_id.as_deref(), Some("1001"));
        assert_eq!(loaded.recovery_value, 150.0);
    }

    #[tokio::test]
    async fn recovery_candidates_exclude_recovered_and_converted() {
        let pool = test_pool().await;
        let tenant_id = Uuid::new_v4();

        let open = cart(tenant_id, "chk-open");
        save_cart(&pool, &open).await.unwrap();

        let done = cart(tenant_id, "chk-done");
        save_cart(&pool, &done).await.unwrap();
        mark_recovered(
            &pool,
            done.id,
            "1002",
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            10.0,
        )
        .await
        .unwrap();

        let mut converted = cart(tenant_id, "chk-conv");
        converted.status = CartStatus::Converted;
        save_cart(&pool, &converted).await.unwrap();

        let candidates = load_recovery_candidates(&pool, tenant_id).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].checkout_id, "chk-open");
    }

    #[tokio::test]
    async fn mark_abandoned_keeps_existing_timestamp() {
        let pool = test_pool().await;
        let tenant_id = Uuid::new_v4();

        let first_seen = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mut c = cart(tenant_id, "chk-3");
        c.abandoned_at = Some(first_seen);
        save_cart(&pool, &c).await.unwrap();

        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        mark_abandoned(&pool, c.id, later).await.unwrap();

        let loaded = load_cart(&pool, tenant_id, "chk-3").await.unwrap().unwrap();
        assert_eq!(loaded.status, CartStatus::Abandoned);
        assert_eq!(loaded.abandoned_at, Some(first_seen));
    }
}
