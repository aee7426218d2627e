//! Customer persistence
//!
//! Upserts key on `(tenant_id, email)`. Derived fields (status, score) are
//! refreshed from the aggregates immediately before every write, so a row
//! read back always reflects its own numbers.

use crate::models::{Customer, CustomerStatus};
use crate::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_ts, parse_ts_opt, parse_uuid};

const COLUMNS: &str = r#"
    id, tenant_id, email, phone, first_name, last_name, status, score,
    total_orders, completed_orders, total_spent, average_order_value,
    total_carts, abandoned_carts, recovered_carts, total_abandoned_value,
    first_seen, first_purchase, last_purchase, last_cart_abandoned,
    last_activity, days_since_last_purchase
"#;

/// Save customer, recomputing status and score first.
pub async fn save_customer(pool: &SqlitePool, customer: &mut Customer) -> Result<()> {
    customer.refresh_derived();

    sqlx::query(
        r#"
        INSERT INTO customers (
            id, tenant_id, email, phone, first_name, last_name, status, score,
            total_orders, completed_orders, total_spent, average_order_value,
            total_carts, abandoned_carts, recovered_carts, total_abandoned_value,
            first_seen, first_purchase, last_purchase, last_cart_abandoned,
            last_activity, days_since_last_purchase, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                  CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(tenant_id, email) DO UPDATE SET
            phone = excluded.phone,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            status = excluded.status,
            score = excluded.score,
            total_orders = excluded.total_orders,
            completed_orders = excluded.completed_orders,
            total_spent = excluded.total_spent,
            average_order_value = excluded.average_order_value,
            total_carts = excluded.total_carts,
            abandoned_carts = excluded.abandoned_carts,
            recovered_carts = excluded.recovered_carts,
            total_abandoned_value = excluded.total_abandoned_value,
            first_seen = excluded.first_seen,
            first_purchase = excluded.first_purchase,
            last_purchase = excluded.last_purchase,
            last_cart_abandoned = excluded.last_cart_abandoned,
            last_activity = excluded.last_activity,
            days_since_last_purchase = excluded.days_since_last_purchase,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(customer.id.to_string())
    .bind(customer.tenant_id.to_string())
    .bind(&customer.email)
    .bind(&customer.phone)
    .bind(&customer.first_name)
    .bind(&customer.last_name)
    .bind(customer.status.as_str())
    .bind(customer.score)
    .bind(customer.total_orders)
    .bind(customer.completed_orders)
    .bind(customer.total_spent)
    .bind(customer.average_order_value)
    .bind(customer.total_carts)
    .bind(customer.abandoned_carts)
    .bind(customer.recovered_carts)
    .bind(customer.total_abandoned_value)
    .bind(customer.first_seen.map(|dt| dt.to_rfc3339()))
    .bind(customer.first_purchase.map(|dt| dt.to_rfc3339()))
    .bind(customer.last_purchase.map(|dt| dt.to_rfc3339()))
    .bind(customer.last_cart_abandoned.map(|dt| dt.to_rfc3339()))
    .bind(customer.last_activity.to_rfc3339())
    .bind(customer.days_since_last_purchase)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one customer by its natural key
pub async fn load_customer_by_email(
    pool: &SqlitePool,
    tenant_id: Uuid,
    email: &str,
) -> Result<Option<Customer>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM customers WHERE tenant_id = ? AND email = ?"
    ))
    .bind(tenant_id.to_string())
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_customer).transpose()
}

/// All customers of a tenant, for the per-customer analysis pass
pub async fn load_customers_for_tenant(
    pool: &SqlitePool,
    tenant_id: Uuid,
) -> Result<Vec<Customer>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM customers WHERE tenant_id = ? ORDER BY email"
    ))
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_customer).collect()
}

/// Customers with a phone on record, for the lead matcher
pub async fn load_customers_with_phone(
    pool: &SqlitePool,
    tenant_id: Uuid,
) -> Result<Vec<Customer>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM customers WHERE tenant_id = ? AND phone IS NOT NULL AND phone != ''"
    ))
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_customer).collect()
}

fn row_to_customer(row: sqlx::sqlite::SqliteRow) -> Result<Customer> {
    let id: String = row.get("id");
    let tenant_id: String = row.get("tenant_id");
    let status: String = row.get("status");
    let last_activity: String = row.get("last_activity");

    Ok(Customer {
        id: parse_uuid(&id)?,
        tenant_id: parse_uuid(&tenant_id)?,
        email: row.get("email"),
        phone: row.get("phone"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        status: CustomerStatus::parse(&status).unwrap_or(CustomerStatus::NeverBought),
        score: row.get("score"),
        total_orders: row.get("total_orders"),
        completed_orders: row.get("completed_orders"),
        total_spent: row.get("total_spent"),
        average_order_value: row.get("average_order_value"),
        total_carts: row.get("total_carts"),
        abandoned_carts: row.get("abandoned_carts"),
        recovered_carts: row.get("recovered_carts"),
        total_abandoned_value: row.get("total_abandoned_value"),
        first_seen: parse_ts_opt(row.get("first_seen"))?,
        first_purchase: parse_ts_opt(row.get("first_purchase"))?,
        last_purchase: parse_ts_opt(row.get("last_purchase"))?,
        last_cart_abandoned: parse_ts_opt(row.get("last_cart_abandoned"))?,
        last_activity: parse_ts(&last_activity)?,
        days_since_last_purchase: row.get("days_since_last_purchase"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let pool = test_pool().await;
        let tenant_id = Uuid::new_v4();

        let mut customer = Customer::new(tenant_id, "ana@example.com".into());
        customer.phone = Some("11987654321".into());
        customer.completed_orders = 2;
        customer.total_orders = 2;
        customer.total_spent = 350.0;
        customer.total_carts = 4;
        customer.days_since_last_purchase = Some(12);

        save_customer(&pool, &mut customer).await.unwrap();

        let loaded = load_customer_by_email(&pool, tenant_id, "ana@example.com")
            .await
            .unwrap()
            .expect("customer not found");

        assert_eq!(loaded.id, customer.id);
        assert_eq!(loaded.phone.as_deref(), Some("11987654321"));
        assert_eq!(loaded.total_spent, 350.0);
        // derived fields were refreshed on save
        assert_eq!(loaded.status, CustomerStatus::Returning);
        assert_eq!(loaded.score, customer.score);
    }

    #[tokio::test]
    async fn second_save_updates_in_place() {
        let pool = test_pool().await;
        let tenant_id = Uuid::new_v4();

        let mut first = Customer::new(tenant_id, "b@example.com".into());
        save_customer(&pool, &mut first).await.unwrap();

        let mut again = load_customer_by_email(&pool, tenant_id, "b@example.com")
            .await
            .unwrap()
            .unwrap();
        again.completed_orders = 1;
        again.total_orders = 1;
        again.total_spent = 99.0;
        save_customer(&pool, &mut again).await.unwrap();

        let all = load_customers_for_tenant(&pool, tenant_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, CustomerStatus::FirstTime);
    }

    #[tokio::test]
    async fn same_email_different_tenants_are_distinct() {
        let pool = test_pool().await;
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();

        save_customer(&pool, &mut Customer::new(t1, "x@y.com".into()))
            .await
            .unwrap();
        save_customer(&pool, &mut Customer::new(t2, "x@y.com".into()))
            .await
            .unwrap();

        assert_eq!(load_customers_for_tenant(&pool, t1).await.unwrap().len(), 1);
        assert_eq!(load_customers_for_tenant(&pool, t2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn phone_filter_excludes_empty() {
        let pool = test_pool().await;
        let tenant_id = Uuid::new_v4();

        let mut with_phone = Customer::new(tenant_id, "p@example.com".into());
        with_phone.phone = Some("11988887777".into());
        save_customer(&pool, &mut with_phone).await.unwrap();
        save_customer(&pool, &mut Customer::new(tenant_id, "q@example.com".into()))
            .await
            .unwrap();

        let matched = load_customers_with_phone(&pool, tenant_id).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].email, "p@example.com");
    }
}
