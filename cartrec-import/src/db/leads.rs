//! Lead persistence
//!
//! Upserts key on `(tenant_id, form_id)`. Customer linkage is written once
//! by the matcher at ingestion time and survives re-import.

use crate::models::{Lead, LeadStatus};
use crate::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_ts, parse_uuid};

pub async fn save_lead(pool: &SqlitePool, lead: &Lead) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO leads (
            id, tenant_id, form_id, name, phone, detail, ip_address,
            status, is_customer, customer_id, captured_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(tenant_id, form_id) DO UPDATE SET
            name = excluded.name,
            phone = excluded.phone,
            detail = excluded.detail,
            ip_address = excluded.ip_address
        "#,
    )
    .bind(lead.id.to_string())
    .bind(lead.tenant_id.to_string())
    .bind(&lead.form_id)
    .bind(&lead.name)
    .bind(&lead.phone)
    .bind(&lead.detail)
    .bind(&lead.ip_address)
    .bind(lead.status.as_str())
    .bind(lead.is_customer)
    .bind(lead.customer_id.map(|id| id.to_string()))
    .bind(lead.captured_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn lead_exists(pool: &SqlitePool, tenant_id: Uuid, form_id: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE tenant_id = ? AND form_id = ?")
            .bind(tenant_id.to_string())
            .bind(form_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn load_lead(pool: &SqlitePool, tenant_id: Uuid, form_id: &str) -> Result<Option<Lead>> {
    let row = sqlx::query(
        r#"
        SELECT id, tenant_id, form_id, name, phone, detail, ip_address,
               status, is_customer, customer_id, captured_at
        FROM leads
        WHERE tenant_id = ? AND form_id = ?
        "#,
    )
    .bind(tenant_id.to_string())
    .bind(form_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_lead).transpose()
}

fn row_to_lead(row: sqlx::sqlite::SqliteRow) -> Result<Lead> {
    let id: String = row.get("id");
    let tenant_id: String = row.get("tenant_id");
    let status: String = row.get("status");
    let customer_id: Option<String> = row.get("customer_id");
    let captured_at: String = row.get("captured_at");

    Ok(Lead {
        id: parse_uuid(&id)?,
        tenant_id: parse_uuid(&tenant_id)?,
        form_id: row.get("form_id"),
        name: row.get("name"),
        phone: row.get("phone"),
        detail: row.get("detail"),
        ip_address: row.get("ip_address"),
        status: LeadStatus::parse(&status).unwrap_or(LeadStatus::New),
        is_customer: row.get("is_customer"),
        customer_id: customer_id.as_deref().map(parse_uuid).transpose()?,
        captured_at: parse_ts(&captured_at)?,
    })
}
