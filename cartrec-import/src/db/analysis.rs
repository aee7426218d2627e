//! Daily analysis rollup persistence
//!
//! One row per `(tenant_id, date)`, rewritten in full by each import run.

use crate::models::CustomerAnalysis;
use crate::Result;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

pub async fn save_analysis(pool: &SqlitePool, analysis: &CustomerAnalysis) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customer_analysis (
            tenant_id, date, total_customers, new_customers,
            never_bought, first_time, returning_customers, abandoned_only, inactive, vip,
            total_carts, abandoned_carts, recovered_carts,
            total_revenue, abandoned_value, avg_order_value, conversion_rate,
            created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(tenant_id, date) DO UPDATE SET
            total_customers = excluded.total_customers,
            new_customers = excluded.new_customers,
            never_bought = excluded.never_bought,
            first_time = excluded.first_time,
            returning_customers = excluded.returning_customers,
            abandoned_only = excluded.abandoned_only,
            inactive = excluded.inactive,
            vip = excluded.vip,
            total_carts = excluded.total_carts,
            abandoned_carts = excluded.abandoned_carts,
            recovered_carts = excluded.recovered_carts,
            total_revenue = excluded.total_revenue,
            abandoned_value = excluded.abandoned_value,
            avg_order_value = excluded.avg_order_value,
            conversion_rate = excluded.conversion_rate
        "#,
    )
    .bind(analysis.tenant_id.to_string())
    .bind(analysis.date.to_string())
    .bind(analysis.total_customers)
    .bind(analysis.new_customers)
    .bind(analysis.never_bought)
    .bind(analysis.first_time)
    .bind(analysis.returning_customers)
    .bind(analysis.abandoned_only)
    .bind(analysis.inactive)
    .bind(analysis.vip)
    .bind(analysis.total_carts)
    .bind(analysis.abandoned_carts)
    .bind(analysis.recovered_carts)
    .bind(analysis.total_revenue)
    .bind(analysis.abandoned_value)
    .bind(analysis.avg_order_value)
    .bind(analysis.conversion_rate)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_analysis(
    pool: &SqlitePool,
    tenant_id: Uuid,
    date: NaiveDate,
) -> Result<Option<CustomerAnalysis>> {
    let row = sqlx::query(
        r#"
        SELECT tenant_id, date, total_customers, new_customers,
               never_bought, first_time, returning_customers, abandoned_only, inactive, vip,
               total_carts, abandoned_carts, recovered_carts,
               total_revenue, abandoned_value, avg_order_value, conversion_rate
        FROM customer_analysis
        WHERE tenant_id = ? AND date = ?
        "#,
    )
    .bind(tenant_id.to_string())
    .bind(date.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let tenant_id_str: String = row.get("tenant_id");
            let date_str: String = row.get("date");
            let date = date_str
                .parse::<NaiveDate>()
                .map_err(|e| crate::Error::Internal(format!("Failed to parse date: {e}")))?;

            Ok(Some(CustomerAnalysis {
                tenant_id: parse_uuid(&tenant_id_str)?,
                date,
                total_customers: row.get("total_customers"),
                new_customers: row.get("new_customers"),
                never_bought: row.get("never_bought"),
                first_time: row.get("first_time"),
                returning_customers: row.get("returning_customers"),
                abandoned_only: row.get("abandoned_only"),
                inactive: row.get("inactive"),
                vip: row.get("vip"),
                total_carts: row.get("total_carts"),
                abandoned_carts: row.get("abandoned_carts"),
                recovered_carts: row.get("recovered_carts"),
                total_revenue: row.get("total_revenue"),
                abandoned_value: row.get("abandoned_value"),
                avg_order_value: row.get("avg_order_value"),
                conversion_rate: row.get("conversion_rate"),
            }))
        }
        None => Ok(None),
    }
}
