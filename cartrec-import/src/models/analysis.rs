//! Daily customer-base rollup
//!
//! One row per `(tenant, date)`. Derived, not authoritative; rewritten in
//! full whenever an import run ends on that date.

use chrono::NaiveDate;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct CustomerAnalysis {
    pub tenant_id: Uuid,
    pub date: NaiveDate,

    pub total_customers: i64,
    pub new_customers: i64,

    // Counts by lifecycle status
    pub never_bought: i64,
    pub first_time: i64,
    pub returning_customers: i64,
    pub abandoned_only: i64,
    pub inactive: i64,
    pub vip: i64,

    pub total_carts: i64,
    pub abandoned_carts: i64,
    pub recovered_carts: i64,

    pub total_revenue: f64,
    pub abandoned_value: f64,

    pub avg_order_value: f64,
    pub conversion_rate: f64,
}
