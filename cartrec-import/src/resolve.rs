//! Identity resolution
//!
//! Merges source-specific customer fragments into one canonical record per
//! `(tenant, email)`. Merge policy is first-non-empty-wins: a field already
//! populated on the stored record is never overwritten by a later
//! enrichment pass; only currently-empty fields are filled. Email is the
//! only required join key; fragments without one are discarded at the
//! source and never reach resolution.

use crate::extract::ExtractedFields;
use crate::models::Customer;

/// A partial view of a customer from one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerFragment {
    pub email: String,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl CustomerFragment {
    /// Fragment with only the join key
    pub fn bare(email: impl Into<String>) -> Option<Self> {
        let email = normalize_email(email.into())?;
        Some(Self {
            email,
            phone: None,
            first_name: None,
            last_name: None,
        })
    }

    /// Build from a cart event's extracted "other fields".
    ///
    /// None when the email is empty: such rows are skipped, not resolved.
    pub fn from_cart_fields(email: &str, fields: &ExtractedFields) -> Option<Self> {
        let email = normalize_email(email.to_string())?;
        Some(Self {
            email,
            phone: non_empty(fields.first_of(&["billing_phone", "phone"])),
            first_name: non_empty(fields.first_of(&["billing_first_name", "first_name"])),
            last_name: non_empty(fields.first_of(&["billing_last_name", "last_name"])),
        })
    }

    /// Build from an order's billing columns
    pub fn from_billing(
        email: Option<&str>,
        phone: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Option<Self> {
        let email = normalize_email(email.unwrap_or_default().to_string())?;
        Some(Self {
            email,
            phone: non_empty(phone),
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
        })
    }
}

/// Apply one enrichment pass to a stored customer, filling gaps only.
///
/// Returns true when any field changed. When two passes disagree on a field
/// that is still empty, whichever pass runs first wins; that tie-break is a
/// property of pass ordering, not of this function.
pub fn fill_gaps(customer: &mut Customer, fragment: &CustomerFragment) -> bool {
    let mut changed = false;
    changed |= fill(&mut customer.phone, &fragment.phone);
    changed |= fill(&mut customer.first_name, &fragment.first_name);
    changed |= fill(&mut customer.last_name, &fragment.last_name);
    changed
}

fn fill(slot: &mut Option<String>, candidate: &Option<String>) -> bool {
    if slot.as_deref().is_some_and(|v| !v.is_empty()) {
        return false;
    }
    match candidate {
        Some(value) if !value.is_empty() => {
            *slot = Some(value.clone());
            true
        }
        _ => false,
    }
}

fn normalize_email(email: String) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
