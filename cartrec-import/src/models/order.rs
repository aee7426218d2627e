//! Imported order record

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Order record, keyed by `(tenant, order_id)`.
///
/// Immutable once seen, except for status/total refresh on re-import.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub order_id: String,
    pub order_number: String,
    pub total: f64,
    /// Source-defined status string (e.g. "wc-completed")
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        tenant_id: Uuid,
        customer_id: Uuid,
        order_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        let order_number = order_id.clone();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            order_id,
            order_number,
            total: 0.0,
            status: String::new(),
            created_at,
        }
    }
}

/// Whether a source order status counts as a completed/qualifying purchase
/// for recovery attribution.
///
/// Source versions disagree on spelling ("wc-completed" vs "completed");
/// the `wc-` prefix is stripped before matching, accepting the superset.
pub fn is_qualifying_status(status: &str) -> bool {
    let normalized = status.trim().strip_prefix("wc-").unwrap_or(status.trim());
    matches!(normalized, "completed" | "processing" | "on-hold")
}

/// Whether a source order status counts toward `completed_orders` and spend
/// aggregates. Narrower than recovery qualification: on-hold orders are not
/// yet revenue.
pub fn is_completed_status(status: &str) -> bool {
    let normalized = status.trim().strip_prefix("wc-").unwrap_or(status.trim());
    matches!(normalized, "completed" | "processing")
}
