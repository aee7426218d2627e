//! Tenant persistence
//!
//! Tenants are operator-managed configuration rows; the importer only reads
//! them, keyed by slug. The save path exists for provisioning and tests.

use crate::models::{LeadFieldMap, SourceDescriptor, Tenant};
use crate::Result;
use sqlx::{Row, SqlitePool};

use super::{parse_ts, parse_uuid};

pub async fn save_tenant(pool: &SqlitePool, tenant: &Tenant) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tenants (
            id, name, slug, active,
            db_host, db_port, db_name, db_user, db_password, table_prefix,
            lead_field_name, lead_field_phone, lead_field_detail,
            msg_template_lead, msg_template_cart, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(slug) DO UPDATE SET
            name = excluded.name,
            active = excluded.active,
            db_host = excluded.db_host,
            db_port = excluded.db_port,
            db_name = excluded.db_name,
            db_user = excluded.db_user,
            db_password = excluded.db_password,
            table_prefix = excluded.table_prefix,
            lead_field_name = excluded.lead_field_name,
            lead_field_phone = excluded.lead_field_phone,
            lead_field_detail = excluded.lead_field_detail,
            msg_template_lead = excluded.msg_template_lead,
            msg_template_cart = excluded.msg_template_cart
        "#,
    )
    .bind(tenant.id.to_string())
    .bind(&tenant.name)
    .bind(&tenant.slug)
    .bind(tenant.active)
    .bind(&tenant.source.db_host)
    .bind(tenant.source.db_port as i64)
    .bind(&tenant.source.db_name)
    .bind(&tenant.source.db_user)
    .bind(&tenant.source.db_password)
    .bind(&tenant.table_prefix)
    .bind(&tenant.lead_fields.name_key)
    .bind(&tenant.lead_fields.phone_key)
    .bind(&tenant.lead_fields.detail_key)
    .bind(&tenant.msg_template_lead)
    .bind(&tenant.msg_template_cart)
    .bind(tenant.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_tenant_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Tenant>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, slug, active,
               db_host, db_port, db_name, db_user, db_password, table_prefix,
               lead_field_name, lead_field_phone, lead_field_detail,
               msg_template_lead, msg_template_cart, created_at
        FROM tenants
        WHERE slug = ?
        "#,
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let created_at: String = row.get("created_at");

            Ok(Some(Tenant {
                id: parse_uuid(&id)?,
                name: row.get("name"),
                slug: row.get("slug"),
                active: row.get("active"),
                source: SourceDescriptor {
                    db_host: row.get("db_host"),
                    db_port: row.get::<i64, _>("db_port") as u16,
                    db_name: row.get("db_name"),
                    db_user: row.get("db_user"),
                    db_password: row.get("db_password"),
                },
                table_prefix: row.get("table_prefix"),
                lead_fields: LeadFieldMap {
                    name_key: row.get("lead_field_name"),
                    phone_key: row.get("lead_field_phone"),
                    detail_key: row.get("lead_field_detail"),
                },
                msg_template_lead: row.get("msg_template_lead"),
                msg_template_cart: row.get("msg_template_cart"),
                created_at: parse_ts(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}
