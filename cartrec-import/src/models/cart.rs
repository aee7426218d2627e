//! Imported checkout/cart record

use crate::extract::CartLine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cart lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Active,
    Abandoned,
    Recovered,
    Converted,
}

impl CartStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Abandoned => "abandoned",
            Self::Recovered => "recovered",
            Self::Converted => "converted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "abandoned" => Some(Self::Abandoned),
            "recovered" => Some(Self::Recovered),
            "converted" => Some(Self::Converted),
            _ => None,
        }
    }
}

/// Cart record, keyed by `(tenant, checkout_id)`
#[derive(Debug, Clone)]
pub struct Cart {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub checkout_id: String,
    pub session_id: Option<String>,
    /// Normalized line items (persisted as JSON)
    pub cart_contents: Vec<CartLine>,
    pub cart_total: f64,
    pub status: CartStatus,
    pub items_count: i64,
    pub created_at: DateTime<Utc>,
    pub abandoned_at: Option<DateTime<Utc>>,

    // Recovery bookkeeping, written only by the attribution engine
    pub was_recovered: bool,
    /// Natural order id of the recovering order, within the same tenant
    pub recovered_order_id: Option<String>,
    pub recovered_at: Option<DateTime<Utc>>,
    pub recovery_value: f64,

    // Outreach bookkeeping, written by manual contact actions
    pub recovery_email_sent: bool,
    pub recovery_email_sent_at: Option<DateTime<Utc>>,
    pub recovery_whatsapp_sent: bool,
    pub recovery_whatsapp_sent_at: Option<DateTime<Utc>>,
    pub recovery_attempts: i64,
}

impl Cart {
    pub fn new(
        tenant_id: Uuid,
        customer_id: Uuid,
        checkout_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            checkout_id,
            session_id: None,
            cart_contents: Vec::new(),
            cart_total: 0.0,
            status: CartStatus::Active,
            items_count: 0,
            created_at,
            abandoned_at: None,
            was_recovered: false,
            recovered_order_id: None,
            recovered_at: None,
            recovery_value: 0.0,
            recovery_email_sent: false,
            recovery_email_sent_at: None,
            recovery_whatsapp_sent: false,
            recovery_whatsapp_sent_at: None,
            recovery_attempts: 0,
        }
    }
}
