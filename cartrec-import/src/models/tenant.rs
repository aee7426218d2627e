//! Tenant: an isolated business account
//!
//! Carries everything the import engine needs to reach and interpret that
//! tenant's storefront data. Identity is immutable once data references it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where to pull source rows from. Opaque to the pipeline itself; consumed
/// by the source cursor implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
}

impl SourceDescriptor {
    /// Minimum viable configuration: database name and user present, and a
    /// reachable (non-local) host.
    pub fn is_configured(&self) -> bool {
        !self.db_name.is_empty()
            && !self.db_user.is_empty()
            && !self.db_host.is_empty()
            && self.db_host != "127.0.0.1"
            && self.db_host != "localhost"
    }
}

/// Which lead-form meta keys hold each logical field, per tenant.
///
/// Form builders generate keys like `Nome_3` or `Whatsapp_8`; the mapping is
/// operator configuration, not derivable from the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadFieldMap {
    pub name_key: String,
    pub phone_key: String,
    /// Empty when the tenant's form has no secondary attribute
    pub detail_key: String,
}

impl Default for LeadFieldMap {
    fn default() -> Self {
        Self {
            name_key: "Nome_3".to_string(),
            phone_key: "Whatsapp_8".to_string(),
            detail_key: String::new(),
        }
    }
}

/// Tenant record
#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub active: bool,
    pub source: SourceDescriptor,
    /// Storefront table-name prefix (e.g. "wp_", "cli_")
    pub table_prefix: String,
    pub lead_fields: LeadFieldMap,
    /// Outreach message templates; `{name}` is substituted. Unused by the
    /// pipeline itself.
    pub msg_template_lead: String,
    pub msg_template_cart: String,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            active: true,
            source: SourceDescriptor::default(),
            table_prefix: "wp_".to_string(),
            lead_fields: LeadFieldMap::default(),
            msg_template_lead: "Hi {name}!".to_string(),
            msg_template_cart: "Hi {name}!".to_string(),
            created_at: Utc::now(),
        }
    }
}
