//! Storefront source access
//!
//! A source cursor yields raw rows from one tenant's storefront database.
//! Rows come back as loosely-typed strings; all interpretation (blob
//! decoding, numeric coercion, status normalization) happens downstream in
//! the import pipeline. Connectivity failures are fatal for the run and
//! surface as [`Error::Source`](crate::Error::Source).

pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

/// Inclusive date range an import run covers
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Trailing window ending now
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }
}

/// One abandoned-checkout event as stored by the storefront plugin
#[derive(Debug, Clone, Default)]
pub struct CartEventRow {
    /// Natural key within the tenant
    pub checkout_id: String,
    pub email: Option<String>,
    /// Opaque blob; JSON, PHP-serialized, or corrupt
    pub cart_contents: Option<String>,
    /// Stringly-typed amount, possibly malformed
    pub cart_total: Option<String>,
    pub session_id: Option<String>,
    /// Secondary blob with billing fields (phone, name)
    pub other_fields: Option<String>,
    /// Plugin-side order status hint, when the checkout converted in place
    pub order_status: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// One order row from the storefront
#[derive(Debug, Clone, Default)]
pub struct OrderRow {
    /// Natural key within the tenant
    pub order_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Stringly-typed amount, possibly malformed
    pub total: Option<String>,
}

/// One lead-form submission
#[derive(Debug, Clone, Default)]
pub struct LeadRow {
    /// Natural key within the tenant
    pub form_id: String,
    pub captured_at: DateTime<Utc>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub detail: Option<String>,
    pub ip_address: Option<String>,
}

/// Read access to one tenant's storefront data
#[async_trait]
pub trait SourceCursor: Send + Sync {
    /// Abandoned-checkout events captured within the range
    async fn cart_events(&self, range: DateRange) -> Result<Vec<CartEventRow>>;

    /// Orders created within the range
    async fn orders(&self, range: DateRange) -> Result<Vec<OrderRow>>;

    /// Lead-form submissions within the range
    async fn lead_entries(&self, range: DateRange) -> Result<Vec<LeadRow>>;
}

/// In-memory source backed by fixed rows. Ignores the date range; fixtures
/// are built per test.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    pub carts: Vec<CartEventRow>,
    pub orders: Vec<OrderRow>,
    pub leads: Vec<LeadRow>,
}

#[async_trait]
impl SourceCursor for FixtureSource {
    async fn cart_events(&self, _range: DateRange) -> Result<Vec<CartEventRow>> {
        Ok(self.carts.clone())
    }

    async fn orders(&self, _range: DateRange) -> Result<Vec<OrderRow>> {
        Ok(self.orders.clone())
    }

    async fn lead_entries(&self, _range: DateRange) -> Result<Vec<LeadRow>> {
        Ok(self.leads.clone())
    }
}
