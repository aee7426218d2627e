//! Lead ingestion and customer matching
//!
//! Form submissions become lead records keyed `(tenant, form_id)`. A newly
//! seen lead is checked once against the tenant's customers by phone-digit
//! containment; the verdict is written at ingestion and never revisited, so
//! a lead that later converts keeps its original linkage until re-matched
//! manually.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::models::{Customer, Lead, LeadStatus};
use crate::source::LeadRow;
use crate::Result;
use cartrec_common::ImportStats;

/// Phone equivalence by digit containment.
///
/// Source numbers disagree on formatting and country/area prefixes, so two
/// numbers match when the digits of one contain the digits of the other.
/// Anything under 8 digits is too short to be meaningful and never matches.
pub fn phones_match(a: &str, b: &str) -> bool {
    let a: String = a.chars().filter(|c| c.is_ascii_digit()).collect();
    let b: String = b.chars().filter(|c| c.is_ascii_digit()).collect();
    if a.len() < 8 || b.len() < 8 {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Find the tenant customer whose phone matches the lead's
pub async fn match_customer(
    pool: &SqlitePool,
    tenant_id: Uuid,
    phone: &str,
) -> Result<Option<Customer>> {
    let candidates = db::customers::load_customers_with_phone(pool, tenant_id).await?;
    Ok(candidates
        .into_iter()
        .find(|c| c.phone.as_deref().is_some_and(|p| phones_match(p, phone))))
}

/// Ingest one batch of lead rows.
///
/// Rows carrying neither name nor phone are skipped. A failing row is
/// counted and logged, never fatal for the batch.
pub async fn ingest_leads(
    pool: &SqlitePool,
    tenant_id: Uuid,
    rows: Vec<LeadRow>,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for row in rows {
        match ingest_one(pool, tenant_id, &row).await {
            Ok(outcome) => match outcome {
                Outcome::Created => stats.created += 1,
                Outcome::Updated => stats.updated += 1,
                Outcome::Skipped => stats.skipped += 1,
            },
            Err(e) => {
                stats.errored += 1;
                tracing::warn!(form_id = %row.form_id, error = %e, "Failed to import lead");
            }
        }
    }

    tracing::info!(
        tenant_id = %tenant_id,
        created = stats.created,
        updated = stats.updated,
        skipped = stats.skipped,
        errored = stats.errored,
        "Lead ingestion finished"
    );

    Ok(stats)
}

enum Outcome {
    Created,
    Updated,
    Skipped,
}

async fn ingest_one(pool: &SqlitePool, tenant_id: Uuid, row: &LeadRow) -> Result<Outcome> {
    let name = row.name.as_deref().map(str::trim).unwrap_or_default();
    let phone = row.phone.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() && phone.is_empty() {
        tracing::debug!(form_id = %row.form_id, "Lead has neither name nor phone, skipping");
        return Ok(Outcome::Skipped);
    }

    let existing = db::leads::lead_exists(pool, tenant_id, &row.form_id).await?;

    let mut lead = Lead::new(tenant_id, row.form_id.clone(), row.captured_at);
    lead.name = (!name.is_empty()).then(|| name.to_string());
    lead.phone = (!phone.is_empty()).then(|| phone.to_string());
    lead.detail = row
        .detail
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    lead.ip_address = row.ip_address.clone();

    // Match once, on first sight only
    if !existing && !phone.is_empty() {
        if let Some(customer) = match_customer(pool, tenant_id, phone).await? {
            tracing::debug!(form_id = %row.form_id, email = %customer.email, "Lead is an existing customer");
            lead.is_customer = true;
            lead.customer_id = Some(customer.id);
            lead.status = LeadStatus::Customer;
        }
    }

    db::leads::save_lead(pool, &lead).await?;

    Ok(if existing {
        Outcome::Updated
    } else {
        Outcome::Created
    })
}
