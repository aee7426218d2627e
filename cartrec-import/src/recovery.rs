//! Recovery attribution engine
//!
//! Decides, for every cart not yet finalized, whether a later purchase by
//! the same customer recovered it. A cart is recovered by the earliest
//! qualifying order placed strictly after the cart and no later than the
//! end of the recovery window; the window end itself still qualifies.
//!
//! Outcomes are one of three: recovered (finalized, never re-evaluated),
//! finally abandoned (window elapsed with no qualifying order), or pending
//! (window still open). Only recovery finalizes a cart; a pending cart is
//! re-evaluated on every run.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::models::order::is_qualifying_status;
use crate::Result;

/// Attribution policy knobs
#[derive(Debug, Clone, Copy)]
pub struct RecoveryPolicy {
    /// How long after cart creation an order can still count as a recovery
    pub window_days: i64,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self { window_days: 30 }
    }
}

impl RecoveryPolicy {
    pub fn window_end(&self, cart_created: DateTime<Utc>) -> DateTime<Utc> {
        cart_created + Duration::days(self.window_days)
    }
}

/// Outcome counts of one attribution pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecoveryReport {
    pub recovered: u64,
    pub abandoned: u64,
    pub pending: u64,
    pub recovered_value: f64,
}

impl RecoveryReport {
    /// recovered / (recovered + finally abandoned); 0 when nothing decided
    pub fn recovery_rate(&self) -> f64 {
        let decided = self.recovered + self.abandoned;
        if decided == 0 {
            0.0
        } else {
            self.recovered as f64 / decided as f64
        }
    }
}

/// Run one attribution pass over every eligible cart of the tenant.
pub async fn attribute_recoveries(
    pool: &SqlitePool,
    tenant_id: Uuid,
    policy: RecoveryPolicy,
    now: DateTime<Utc>,
) -> Result<RecoveryReport> {
    let candidates = db::carts::load_recovery_candidates(pool, tenant_id).await?;
    tracing::debug!(
        tenant_id = %tenant_id,
        candidates = candidates.len(),
        window_days = policy.window_days,
        "Attributing cart recoveries"
    );

    let mut report = RecoveryReport::default();

    for cart in candidates {
        let window_end = policy.window_end(cart.created_at);
        let orders =
            db::orders::load_orders_in_window(pool, cart.customer_id, cart.created_at, window_end)
                .await?;

        if let Some(order) = orders.iter().find(|o| is_qualifying_status(&o.status)) {
            db::carts::mark_recovered(pool, cart.id, &order.order_id, order.created_at, order.total)
                .await?;
            report.recovered += 1;
            report.recovered_value += order.total;
            tracing::info!(
                checkout_id = %cart.checkout_id,
                order_id = %order.order_id,
                value = order.total,
                "Cart recovered"
            );
        } else if now > window_end {
            db::carts::mark_abandoned(pool, cart.id, window_end).await?;
            report.abandoned += 1;
        } else {
            report.pending += 1;
        }
    }

    tracing::info!(
        tenant_id = %tenant_id,
        recovered = report.recovered,
        abandoned = report.abandoned,
        pending = report.pending,
        recovered_value = report.recovered_value,
        "Recovery attribution finished"
    );

    Ok(report)
}
