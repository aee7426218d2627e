//! cartrec-import - Storefront reconciliation and cart-recovery attribution
//!
//! Pulls messy, semi-structured commerce rows (abandoned-cart events, order
//! records, lead-form entries) from a per-tenant storefront database, merges
//! them into one canonical customer per `(tenant, email)`, and derives what
//! no upstream system provides: which abandoned carts were recovered by a
//! later purchase, and a lifecycle status + score for every customer.
//!
//! Re-running any import over overlapping data is safe; upserts are keyed by
//! natural key and recovery attribution skips already-finalized carts.

pub mod config;
pub mod db;
pub mod extract;
pub mod import;
pub mod leads;
pub mod models;
pub mod recovery;
pub mod resolve;
pub mod source;

pub use cartrec_common::{Error, Result};
