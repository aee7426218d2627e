//! Import orchestrator
//!
//! Runs the phases of one import job against a tenant's source: cart
//! events, orders, recovery attribution, then the per-customer analysis and
//! daily rollup. Each phase reports progress through the job's sink and
//! isolates per-record failures; only source connectivity is fatal.

pub mod progress;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::extract::{self, coerce_money};
use crate::models::order::is_completed_status;
use crate::models::{Cart, CartStatus, Customer, CustomerAnalysis, CustomerStatus, Order, Tenant};
use crate::recovery::{attribute_recoveries, RecoveryPolicy, RecoveryReport};
use crate::resolve::{fill_gaps, CustomerFragment};
use crate::source::{CartEventRow, DateRange, OrderRow, SourceCursor};
use crate::Result;
use cartrec_common::{ImportStats, JobStatus, JobSummary};
use progress::{summarize, ProgressReporter};

/// Which phases a commerce import runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportType {
    All,
    Carts,
    Orders,
}

impl ImportType {
    fn includes_carts(self) -> bool {
        matches!(self, ImportType::All | ImportType::Carts)
    }

    fn includes_orders(self) -> bool {
        matches!(self, ImportType::All | ImportType::Orders)
    }
}

/// Named periods for lead imports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadsPeriod {
    Yesterday,
    SevenDays,
    ThirtyDays,
    CurrentMonth,
}

impl LeadsPeriod {
    /// Resolve the period against a reference instant
    pub fn date_range(self, now: DateTime<Utc>) -> DateRange {
        match self {
            LeadsPeriod::Yesterday => {
                let yesterday = (now - Duration::days(1)).date_naive();
                let start = Utc
                    .from_utc_datetime(&yesterday.and_hms_opt(0, 0, 0).unwrap_or_default());
                let end = Utc
                    .from_utc_datetime(&yesterday.and_hms_opt(23, 59, 59).unwrap_or_default());
                DateRange::new(start, end)
            }
            LeadsPeriod::SevenDays => DateRange::new(now - Duration::days(7), now),
            LeadsPeriod::ThirtyDays => DateRange::new(now - Duration::days(30), now),
            LeadsPeriod::CurrentMonth => {
                let first = now
                    .date_naive()
                    .with_day(1)
                    .unwrap_or_else(|| now.date_naive());
                let start =
                    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).unwrap_or_default());
                DateRange::new(start, now)
            }
        }
    }
}

/// Run a commerce import (carts and/or orders) for one tenant.
///
/// Returns the terminal summary; any error bubbling out of here is fatal
/// for the job and should be reported through the sink by the caller.
pub async fn run_commerce_import(
    pool: &SqlitePool,
    tenant: &Tenant,
    source: &dyn SourceCursor,
    range: DateRange,
    import_type: ImportType,
    policy: RecoveryPolicy,
    reporter: &mut ProgressReporter<'_>,
) -> Result<JobSummary> {
    let now = Utc::now();
    tracing::info!(
        tenant = %tenant.slug,
        start = %range.start,
        end = %range.end,
        ?import_type,
        "Starting commerce import"
    );
    reporter.update(10, "Starting import").await;

    if import_type.includes_carts() {
        let rows = source.cart_events(range).await?;
        reporter
            .update(20, &format!("Found {} cart events", rows.len()))
            .await;
        let stats = import_cart_events(pool, tenant.id, &rows, reporter).await?;
        reporter.merge_stats(stats);
    }

    if import_type.includes_orders() {
        let rows = source.orders(range).await?;
        let stats = import_order_rows(pool, tenant.id, &rows).await?;
        reporter.merge_stats(stats);
        reporter
            .update(75, &format!("Imported {} orders", rows.len()))
            .await;
    }

    let recovery = attribute_recoveries(pool, tenant.id, policy, now).await?;
    reporter
        .update(
            85,
            &format!(
                "Recovery: {} recovered, {} abandoned, {} pending",
                recovery.recovered, recovery.abandoned, recovery.pending
            ),
        )
        .await;

    analyze_customers(pool, tenant.id, now).await?;
    save_daily_rollup(pool, tenant.id, now).await?;
    reporter.update(95, "Customer analysis complete").await;

    reporter.finish("Import complete").await;
    Ok(summarize(JobStatus::Done, reporter.stats(), &recovery))
}

/// Run a lead import for one tenant
pub async fn run_leads_import(
    pool: &SqlitePool,
    tenant: &Tenant,
    source: &dyn SourceCursor,
    range: DateRange,
    reporter: &mut ProgressReporter<'_>,
) -> Result<JobSummary> {
    tracing::info!(
        tenant = %tenant.slug,
        start = %range.start,
        end = %range.end,
        "Starting lead import"
    );
    reporter.update(10, "Starting lead import").await;

    let rows = source.lead_entries(range).await?;
    reporter
        .update(30, &format!("Found {} lead entries", rows.len()))
        .await;

    let stats = crate::leads::ingest_leads(pool, tenant.id, rows).await?;
    reporter.merge_stats(stats);

    reporter.finish("Lead import complete").await;
    Ok(summarize(
        JobStatus::Done,
        reporter.stats(),
        &RecoveryReport::default(),
    ))
}

enum Outcome {
    Created,
    Updated,
    Skipped,
}

async fn import_cart_events(
    pool: &SqlitePool,
    tenant_id: Uuid,
    rows: &[CartEventRow],
    reporter: &mut ProgressReporter<'_>,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let total = rows.len().max(1);
    let mut last_pct = 0u8;

    for (idx, row) in rows.iter().enumerate() {
        match import_cart_event(pool, tenant_id, row).await {
            Ok(Outcome::Created) => stats.created += 1,
            Ok(Outcome::Updated) => stats.updated += 1,
            Ok(Outcome::Skipped) => stats.skipped += 1,
            Err(e) => {
                stats.errored += 1;
                tracing::warn!(checkout_id = %row.checkout_id, error = %e, "Failed to import cart event");
            }
        }

        // 30..=70 across the cart phase
        let pct = 30 + ((idx + 1) * 40 / total) as u8;
        if pct > last_pct {
            last_pct = pct;
            reporter.update(pct, "Importing carts").await;
        }
    }

    Ok(stats)
}

async fn import_cart_event(
    pool: &SqlitePool,
    tenant_id: Uuid,
    row: &CartEventRow,
) -> Result<Outcome> {
    let other = extract::extract(row.other_fields.as_deref());
    let Some(fragment) =
        CustomerFragment::from_cart_fields(row.email.as_deref().unwrap_or_default(), &other)
    else {
        tracing::debug!(checkout_id = %row.checkout_id, "Cart event without email, skipping");
        return Ok(Outcome::Skipped);
    };

    let customer = upsert_customer(pool, tenant_id, &fragment, row.captured_at).await?;

    let existed = db::carts::cart_exists(pool, tenant_id, &row.checkout_id).await?;

    let contents = extract::extract(row.cart_contents.as_deref());
    let mut cart = Cart::new(tenant_id, customer.id, row.checkout_id.clone(), row.captured_at);
    cart.session_id = row.session_id.clone();
    cart.cart_total = coerce_money(row.cart_total.as_deref());
    cart.items_count = contents.total_items;
    cart.cart_contents = contents.items;
    if row.order_status.as_deref() == Some("abandoned") {
        cart.status = CartStatus::Abandoned;
        cart.abandoned_at = Some(row.captured_at);
    }
    db::carts::save_cart(pool, &cart).await?;

    Ok(if existed {
        Outcome::Updated
    } else {
        Outcome::Created
    })
}

async fn import_order_rows(
    pool: &SqlitePool,
    tenant_id: Uuid,
    rows: &[OrderRow],
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for row in rows {
        match import_order_row(pool, tenant_id, row).await {
            Ok(Outcome::Created) => stats.created += 1,
            Ok(Outcome::Updated) => stats.updated += 1,
            Ok(Outcome::Skipped) => stats.skipped += 1,
            Err(e) => {
                stats.errored += 1;
                tracing::warn!(order_id = %row.order_id, error = %e, "Failed to import order");
            }
        }
    }

    Ok(stats)
}

async fn import_order_row(pool: &SqlitePool, tenant_id: Uuid, row: &OrderRow) -> Result<Outcome> {
    let Some(fragment) = CustomerFragment::from_billing(
        row.email.as_deref(),
        row.phone.as_deref(),
        row.first_name.as_deref(),
        row.last_name.as_deref(),
    ) else {
        tracing::debug!(order_id = %row.order_id, "Order without billing email, skipping");
        return Ok(Outcome::Skipped);
    };
    let Some(created_at) = row.created_at else {
        tracing::debug!(order_id = %row.order_id, "Order without creation date, skipping");
        return Ok(Outcome::Skipped);
    };

    let customer = upsert_customer(pool, tenant_id, &fragment, created_at).await?;

    let existed = db::orders::order_exists(pool, tenant_id, &row.order_id).await?;

    let mut order = Order::new(tenant_id, customer.id, row.order_id.clone(), created_at);
    order.total = coerce_money(row.total.as_deref());
    order.status = row.status.clone().unwrap_or_default();
    db::orders::save_order(pool, &order).await?;

    Ok(if existed {
        Outcome::Updated
    } else {
        Outcome::Created
    })
}

/// Load-or-create the canonical customer for a fragment and apply one
/// gap-filling pass.
async fn upsert_customer(
    pool: &SqlitePool,
    tenant_id: Uuid,
    fragment: &CustomerFragment,
    seen_at: DateTime<Utc>,
) -> Result<Customer> {
    let mut customer = db::customers::load_customer_by_email(pool, tenant_id, &fragment.email)
        .await?
        .unwrap_or_else(|| Customer::new(tenant_id, fragment.email.clone()));

    fill_gaps(&mut customer, fragment);
    customer.first_seen = Some(match customer.first_seen {
        Some(existing) => existing.min(seen_at),
        None => seen_at,
    });
    customer.last_activity = customer.last_activity.max(seen_at);

    db::customers::save_customer(pool, &mut customer).await?;
    Ok(customer)
}

/// Recompute every customer's aggregates from their orders and carts, then
/// save (which refreshes status and score).
async fn analyze_customers(pool: &SqlitePool, tenant_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let customers = db::customers::load_customers_for_tenant(pool, tenant_id).await?;
    tracing::debug!(tenant_id = %tenant_id, customers = customers.len(), "Analyzing customers");

    for mut customer in customers {
        let orders = db::orders::load_orders_for_customer(pool, customer.id).await?;
        let completed: Vec<&Order> = orders
            .iter()
            .filter(|o| is_completed_status(&o.status))
            .collect();

        customer.total_orders = orders.len() as i64;
        customer.completed_orders = completed.len() as i64;
        customer.total_spent = completed.iter().map(|o| o.total).sum();
        if customer.completed_orders > 0 {
            customer.average_order_value = customer.total_spent / customer.completed_orders as f64;
            customer.first_purchase = completed.iter().map(|o| o.created_at).min();
            customer.last_purchase = completed.iter().map(|o| o.created_at).max();
            customer.days_since_last_purchase = customer
                .last_purchase
                .map(|last| (now - last).num_days());
        } else {
            // a refund re-import can drop completed orders back to zero;
            // purchase markers must not outlive them
            customer.average_order_value = 0.0;
            customer.first_purchase = None;
            customer.last_purchase = None;
            customer.days_since_last_purchase = None;
        }

        let carts = db::carts::load_carts_for_customer(pool, customer.id).await?;
        let abandoned: Vec<&Cart> = carts
            .iter()
            .filter(|c| c.status == CartStatus::Abandoned)
            .collect();
        customer.total_carts = carts.len() as i64;
        customer.abandoned_carts = abandoned.len() as i64;
        customer.recovered_carts = carts.iter().filter(|c| c.was_recovered).count() as i64;
        customer.total_abandoned_value = abandoned.iter().map(|c| c.cart_total).sum();
        customer.last_cart_abandoned = abandoned.iter().map(|c| c.created_at).max();

        let last_cart_activity = carts.iter().map(|c| c.created_at).max();
        customer.last_activity = [Some(customer.last_activity), customer.last_purchase, last_cart_activity]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(customer.last_activity);

        db::customers::save_customer(pool, &mut customer).await?;
    }

    Ok(())
}

/// Rewrite today's analysis rollup from the customer base
async fn save_daily_rollup(pool: &SqlitePool, tenant_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let customers = db::customers::load_customers_for_tenant(pool, tenant_id).await?;
    let today = now.date_naive();

    let mut rollup = CustomerAnalysis {
        tenant_id,
        date: today,
        ..Default::default()
    };

    for customer in &customers {
        rollup.total_customers += 1;
        if customer.first_seen.map(|dt| dt.date_naive()) == Some(today) {
            rollup.new_customers += 1;
        }
        match customer.status {
            CustomerStatus::NeverBought => rollup.never_bought += 1,
            CustomerStatus::FirstTime => rollup.first_time += 1,
            CustomerStatus::Returning => rollup.returning_customers += 1,
            CustomerStatus::AbandonedOnly => rollup.abandoned_only += 1,
            CustomerStatus::Inactive => rollup.inactive += 1,
            CustomerStatus::Vip => rollup.vip += 1,
        }
        rollup.total_carts += customer.total_carts;
        rollup.abandoned_carts += customer.abandoned_carts;
        rollup.recovered_carts += customer.recovered_carts;
        rollup.total_revenue += customer.total_spent;
        rollup.abandoned_value += customer.total_abandoned_value;
    }

    let completed_orders: i64 = customers.iter().map(|c| c.completed_orders).sum();
    if completed_orders > 0 {
        rollup.avg_order_value = rollup.total_revenue / completed_orders as f64;
    }
    if rollup.total_customers > 0 {
        let buyers = customers.iter().filter(|c| c.completed_orders > 0).count();
        rollup.conversion_rate = buyers as f64 / rollup.total_customers as f64;
    }

    db::analysis::save_analysis(pool, &rollup).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leads_period_yesterday_covers_the_full_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        let range = LeadsPeriod::Yesterday.date_range(now);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 5, 9, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 5, 9, 23, 59, 59).unwrap());
    }

    #[test]
    fn leads_period_current_month_starts_on_the_first() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        let range = LeadsPeriod::CurrentMonth.date_range(now);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(range.end, now);
    }

    #[test]
    fn import_type_phase_selection() {
        assert!(ImportType::All.includes_carts());
        assert!(ImportType::All.includes_orders());
        assert!(ImportType::Carts.includes_carts());
        assert!(!ImportType::Carts.includes_orders());
        assert!(!ImportType::Orders.includes_carts());
    }
}
