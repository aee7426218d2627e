//! MySQL storefront cursor
//!
//! Reads the three upstream tables directly:
//! - `{prefix}cartflows_ca_cart_abandonment` for checkout events
//! - `{prefix}posts` + `{prefix}postmeta` for orders (billing fields live in
//!   meta rows keyed `_billing_*` / `_order_total`)
//! - the lead-form entry tables, whose name is discovered at runtime because
//!   older plugin versions shipped with a typo ("enteries")
//!
//! Source timestamps are naive local DATETIMEs; they are treated as UTC.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;

use crate::models::{LeadFieldMap, SourceDescriptor, Tenant};
use crate::{Error, Result};

use super::{CartEventRow, DateRange, LeadRow, OrderRow, SourceCursor};

pub struct MySqlSource {
    pool: MySqlPool,
    table_prefix: String,
    lead_fields: LeadFieldMap,
}

impl MySqlSource {
    /// Connect to a tenant's storefront database.
    ///
    /// Any connectivity problem is a fatal [`Error::Source`]; there is no
    /// partial import without a reachable source.
    pub async fn connect(tenant: &Tenant) -> Result<Self> {
        let descriptor = &tenant.source;
        if !descriptor.is_configured() {
            return Err(Error::Source(format!(
                "Tenant '{}' has no usable source database configured",
                tenant.slug
            )));
        }

        let pool = connect_pool(descriptor).await?;
        tracing::info!(
            tenant = %tenant.slug,
            host = %descriptor.db_host,
            database = %descriptor.db_name,
            "Connected to storefront database"
        );

        Ok(Self {
            pool,
            table_prefix: tenant.table_prefix.clone(),
            lead_fields: tenant.lead_fields.clone(),
        })
    }

    /// Locate the lead-entries table. Older plugin versions created
    /// `fv_enteries` (sic); newer ones fixed the spelling.
    async fn discover_lead_tables(&self) -> Result<(String, String)> {
        for candidate in ["fv_enteries", "fv_entries"] {
            let pattern = format!("%{candidate}%");
            let row: Option<MySqlRow> = sqlx::query("SHOW TABLES LIKE ?")
                .bind(&pattern)
                .fetch_optional(&self.pool)
                .await
                .map_err(source_err)?;

            if let Some(row) = row {
                let entries: String = row.try_get(0).map_err(source_err)?;
                let prefix = entries
                    .split("fv_")
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let meta = format!("{prefix}fv_entry_meta");
                tracing::debug!(entries = %entries, meta = %meta, "Lead tables discovered");
                return Ok((entries, meta));
            }
        }

        Err(Error::Source(
            "Lead form tables not found in source database".to_string(),
        ))
    }
}

#[async_trait]
impl SourceCursor for MySqlSource {
    async fn cart_events(&self, range: DateRange) -> Result<Vec<CartEventRow>> {
        let query = format!(
            r#"
            SELECT checkout_id, email, cart_contents, cart_total,
                   session_id, other_fields, order_status, time
            FROM {prefix}cartflows_ca_cart_abandonment
            WHERE time BETWEEN ? AND ?
            ORDER BY time
            "#,
            prefix = self.table_prefix
        );

        let rows = sqlx::query(&query)
            .bind(range.start.naive_utc())
            .bind(range.end.naive_utc())
            .fetch_all(&self.pool)
            .await
            .map_err(source_err)?;

        rows.into_iter()
            .map(|row| {
                let checkout_id: i64 = row.try_get("checkout_id").map_err(source_err)?;
                let captured: NaiveDateTime = row.try_get("time").map_err(source_err)?;
                Ok(CartEventRow {
                    checkout_id: checkout_id.to_string(),
                    email: row.try_get("email").map_err(source_err)?,
                    cart_contents: row.try_get("cart_contents").map_err(source_err)?,
                    cart_total: row.try_get("cart_total").map_err(source_err)?,
                    session_id: row.try_get("session_id").map_err(source_err)?,
                    other_fields: row.try_get("other_fields").map_err(source_err)?,
                    order_status: row.try_get("order_status").map_err(source_err)?,
                    captured_at: captured.and_utc(),
                })
            })
            .collect()
    }

    async fn orders(&self, range: DateRange) -> Result<Vec<OrderRow>> {
        let query = format!(
            r#"
            SELECT
                p.ID AS order_id,
                p.post_date AS created_at,
                p.post_status AS status,
                pm_email.meta_value AS email,
                pm_phone.meta_value AS phone,
                pm_fname.meta_value AS first_name,
                pm_lname.meta_value AS last_name,
                pm_total.meta_value AS total
            FROM {prefix}posts p
            LEFT JOIN {prefix}postmeta pm_email ON p.ID = pm_email.post_id
                AND pm_email.meta_key = '_billing_email'
            LEFT JOIN {prefix}postmeta pm_phone ON p.ID = pm_phone.post_id
                AND pm_phone.meta_key = '_billing_phone'
            LEFT JOIN {prefix}postmeta pm_fname ON p.ID = pm_fname.post_id
                AND pm_fname.meta_key = '_billing_first_name'
            LEFT JOIN {prefix}postmeta pm_lname ON p.ID = pm_lname.post_id
                AND pm_lname.meta_key = '_billing_last_name'
            LEFT JOIN {prefix}postmeta pm_total ON p.ID = pm_total.post_id
                AND pm_total.meta_key = '_order_total'
            WHERE p.post_type = 'shop_order'
              AND p.post_status IN ('wc-completed', 'wc-processing', 'wc-on-hold')
              AND p.post_date BETWEEN ? AND ?
            ORDER BY p.post_date
            "#,
            prefix = self.table_prefix
        );

        let rows = sqlx::query(&query)
            .bind(range.start.naive_utc())
            .bind(range.end.naive_utc())
            .fetch_all(&self.pool)
            .await
            .map_err(source_err)?;

        rows.into_iter()
            .map(|row| {
                let order_id: i64 = row.try_get("order_id").map_err(source_err)?;
                let created: Option<NaiveDateTime> =
                    row.try_get("created_at").map_err(source_err)?;
                Ok(OrderRow {
                    order_id: order_id.to_string(),
                    created_at: created.map(|dt| dt.and_utc()),
                    status: row.try_get("status").map_err(source_err)?,
                    email: row.try_get("email").map_err(source_err)?,
                    phone: row.try_get("phone").map_err(source_err)?,
                    first_name: row.try_get("first_name").map_err(source_err)?,
                    last_name: row.try_get("last_name").map_err(source_err)?,
                    total: row.try_get("total").map_err(source_err)?,
                })
            })
            .collect()
    }

    async fn lead_entries(&self, range: DateRange) -> Result<Vec<LeadRow>> {
        let (entries_table, meta_table) = self.discover_lead_tables().await?;

        let detail_case = if self.lead_fields.detail_key.is_empty() {
            "NULL".to_string()
        } else {
            format!(
                "MAX(CASE WHEN m.meta_key = '{}' THEN m.meta_value END)",
                self.lead_fields.detail_key
            )
        };

        let query = format!(
            r#"
            SELECT
                e.id AS form_id,
                e.captured AS captured_at,
                MAX(CASE WHEN m.meta_key = '{name_key}' THEN m.meta_value END) AS name,
                MAX(CASE WHEN m.meta_key = '{phone_key}' THEN m.meta_value END) AS phone,
                {detail_case} AS detail,
                MAX(CASE WHEN m.meta_key = 'IP' THEN m.meta_value END) AS ip_address
            FROM {entries_table} e
            LEFT JOIN {meta_table} m ON e.id = m.data_id
            WHERE e.captured BETWEEN ? AND ?
            GROUP BY e.id
            ORDER BY e.captured
            "#,
            name_key = self.lead_fields.name_key,
            phone_key = self.lead_fields.phone_key,
        );

        let rows = sqlx::query(&query)
            .bind(range.start.naive_utc())
            .bind(range.end.naive_utc())
            .fetch_all(&self.pool)
            .await
            .map_err(source_err)?;

        rows.into_iter()
            .map(|row| {
                let form_id: i64 = row.try_get("form_id").map_err(source_err)?;
                let captured: NaiveDateTime = row.try_get("captured_at").map_err(source_err)?;
                Ok(LeadRow {
                    form_id: form_id.to_string(),
                    captured_at: captured.and_utc(),
                    name: row.try_get("name").map_err(source_err)?,
                    phone: row.try_get("phone").map_err(source_err)?,
                    detail: row.try_get("detail").map_err(source_err)?,
                    ip_address: row.try_get("ip_address").map_err(source_err)?,
                })
            })
            .collect()
    }
}

async fn connect_pool(descriptor: &SourceDescriptor) -> Result<MySqlPool> {
    let options = MySqlConnectOptions::new()
        .host(&descriptor.db_host)
        .port(descriptor.db_port)
        .database(&descriptor.db_name)
        .username(&descriptor.db_user)
        .password(&descriptor.db_password);

    MySqlPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(15))
        .connect_with(options)
        .await
        .map_err(|e| Error::Source(format!("Failed to connect to storefront database: {e}")))
}

fn source_err(e: sqlx::Error) -> Error {
    Error::Source(format!("Storefront query failed: {e}"))
}
