//! Captured lead-form entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Customer,
    Potential,
    Lost,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Customer => "customer",
            Self::Potential => "potential",
            Self::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "customer" => Some(Self::Customer),
            "potential" => Some(Self::Potential),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

/// Lead record, keyed by `(tenant, form_id)`
#[derive(Debug, Clone)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub form_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    /// Free-text secondary attribute from the form (e.g. size/variant)
    pub detail: Option<String>,
    pub ip_address: Option<String>,
    pub status: LeadStatus,
    pub is_customer: bool,
    /// Matched customer within the same tenant, when the phone matcher hit
    pub customer_id: Option<Uuid>,
    pub captured_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(tenant_id: Uuid, form_id: String, captured_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            form_id,
            name: None,
            phone: None,
            detail: None,
            ip_address: None,
            status: LeadStatus::New,
            is_customer: false,
            customer_id: None,
            captured_at,
        }
    }
}
