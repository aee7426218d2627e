//! Domain entities
//!
//! All entities are tenant-scoped; natural keys are unique per
//! `(tenant, key)`, never globally.

pub mod analysis;
pub mod cart;
pub mod customer;
pub mod lead;
pub mod order;
pub mod tenant;

pub use analysis::CustomerAnalysis;
pub use cart::{Cart, CartStatus};
pub use customer::{Customer, CustomerStatus};
pub use lead::{Lead, LeadStatus};
pub use order::Order;
pub use tenant::{LeadFieldMap, SourceDescriptor, Tenant};
