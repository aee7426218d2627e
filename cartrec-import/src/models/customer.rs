//! Canonical customer record
//!
//! One customer per `(tenant, email)`. Lifecycle status and score are a pure
//! function of the stored aggregates and are recomputed on every save; they
//! are never set directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Behavioral lifecycle classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    NeverBought,
    FirstTime,
    Returning,
    AbandonedOnly,
    Inactive,
    Vip,
}

impl CustomerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverBought => "never_bought",
            Self::FirstTime => "first_time",
            Self::Returning => "returning",
            Self::AbandonedOnly => "abandoned_only",
            Self::Inactive => "inactive",
            Self::Vip => "vip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "never_bought" => Some(Self::NeverBought),
            "first_time" => Some(Self::FirstTime),
            "returning" => Some(Self::Returning),
            "abandoned_only" => Some(Self::AbandonedOnly),
            "inactive" => Some(Self::Inactive),
            "vip" => Some(Self::Vip),
            _ => None,
        }
    }
}

/// Customer record
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    pub status: CustomerStatus,
    pub score: i64,

    // Purchase aggregates (recomputed from orders each run)
    pub total_orders: i64,
    pub completed_orders: i64,
    pub total_spent: f64,
    pub average_order_value: f64,

    // Cart aggregates (recomputed from carts each run)
    pub total_carts: i64,
    pub abandoned_carts: i64,
    pub recovered_carts: i64,
    pub total_abandoned_value: f64,

    // Temporal markers
    pub first_seen: Option<DateTime<Utc>>,
    pub first_purchase: Option<DateTime<Utc>>,
    pub last_purchase: Option<DateTime<Utc>>,
    pub last_cart_abandoned: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub days_since_last_purchase: Option<i64>,
}

impl Customer {
    /// New customer seen for the first time, with empty aggregates
    pub fn new(tenant_id: Uuid, email: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            email,
            phone: None,
            first_name: None,
            last_name: None,
            status: CustomerStatus::NeverBought,
            score: 0,
            total_orders: 0,
            completed_orders: 0,
            total_spent: 0.0,
            average_order_value: 0.0,
            total_carts: 0,
            abandoned_carts: 0,
            recovered_carts: 0,
            total_abandoned_value: 0.0,
            first_seen: None,
            first_purchase: None,
            last_purchase: None,
            last_cart_abandoned: None,
            last_activity: Utc::now(),
            days_since_last_purchase: None,
        }
    }

    /// Display name: first + last, or the email local part when both empty
    pub fn full_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        if name.is_empty() {
            self.email.split('@').next().unwrap_or("").to_string()
        } else {
            name.to_string()
        }
    }

    /// Digits-only phone with country code 55 prefixed when missing.
    /// None when the number has fewer than 10 digits.
    pub fn whatsapp_number(&self) -> Option<String> {
        let phone = self.phone.as_deref()?;
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 10 {
            return None;
        }
        if digits.starts_with("55") {
            Some(digits)
        } else {
            Some(format!("55{digits}"))
        }
    }

    /// Recompute status and score from the stored aggregates.
    ///
    /// Must run before every persist; the two fields are derived, never
    /// hand-set.
    pub fn refresh_derived(&mut self) {
        self.status = calculate_status(
            self.completed_orders,
            self.abandoned_carts,
            self.days_since_last_purchase,
            self.total_spent,
        );
        self.score = calculate_score(
            self.total_spent,
            self.completed_orders,
            self.days_since_last_purchase,
            self.total_carts,
        );
    }
}

/// Lifecycle classification. Rules evaluated in order, first match wins.
pub fn calculate_status(
    completed_orders: i64,
    abandoned_carts: i64,
    days_since_last_purchase: Option<i64>,
    total_spent: f64,
) -> CustomerStatus {
    if completed_orders == 0 {
        if abandoned_carts > 0 {
            return CustomerStatus::AbandonedOnly;
        }
        return CustomerStatus::NeverBought;
    }
    if completed_orders == 1 {
        return CustomerStatus::FirstTime;
    }
    if let Some(days) = days_since_last_purchase {
        if days > 180 {
            return CustomerStatus::Inactive;
        }
    }
    if total_spent > 1000.0 || completed_orders > 10 {
        return CustomerStatus::Vip;
    }
    CustomerStatus::Returning
}

/// Customer score, integer clamped to [0, 100].
///
/// Additive components: spend (up to 40), frequency (up to 30), recency
/// (up to 20, unknown recency contributes 0), conversion (up to 10).
pub fn calculate_score(
    total_spent: f64,
    completed_orders: i64,
    days_since_last_purchase: Option<i64>,
    total_carts: i64,
) -> i64 {
    let mut score = 0.0_f64;

    if total_spent > 0.0 {
        score += (total_spent / 100.0).min(40.0);
    }

    if completed_orders > 0 {
        score += ((completed_orders * 3) as f64).min(30.0);
    }

    match days_since_last_purchase {
        Some(days) if days < 30 => score += 20.0,
        Some(days) if days < 90 => score += 10.0,
        Some(days) if days < 180 => score += 5.0,
        _ => {}
    }

    if total_carts > 0 {
        let conversion_rate = completed_orders as f64 / total_carts as f64;
        score += conversion_rate * 10.0;
    }

    (score as i64).clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_abandoned_only_beats_never_bought() {
        assert_eq!(
            calculate_status(0, 3, None, 0.0),
            CustomerStatus::AbandonedOnly
        );
        assert_eq!(calculate_status(0, 0, None, 0.0), CustomerStatus::NeverBought);
    }

    #[test]
    fn status_single_purchase_is_first_time() {
        // first_time wins even over a VIP-level spend
        assert_eq!(
            calculate_status(1, 0, Some(5), 2000.0),
            CustomerStatus::FirstTime
        );
    }

    #[test]
    fn status_inactive_checked_before_vip() {
        assert_eq!(
            calculate_status(12, 0, Some(200), 5000.0),
            CustomerStatus::Inactive
        );
    }

    #[test]
    fn status_vip_by_spend_or_order_count() {
        assert_eq!(calculate_status(2, 0, Some(10), 1500.0), CustomerStatus::Vip);
        assert_eq!(calculate_status(11, 0, Some(10), 50.0), CustomerStatus::Vip);
        assert_eq!(calculate_status(5, 0, Some(10), 500.0), CustomerStatus::Returning);
    }

    #[test]
    fn status_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(calculate_status(12, 1, Some(10), 1200.0), CustomerStatus::Vip);
        }
    }

    #[test]
    fn score_components_add_up() {
        // spend 1200 -> 12, orders 12 -> capped 30, recency 10d -> 20, no carts
        assert_eq!(calculate_score(1200.0, 12, Some(10), 0), 62);
    }

    #[test]
    fn score_spend_component_caps_at_40() {
        // 10_000 spend alone would be 100 uncapped
        assert_eq!(calculate_score(10_000.0, 0, None, 0), 40);
    }

    #[test]
    fn score_recency_tiers() {
        assert_eq!(calculate_score(0.0, 0, Some(29), 0), 20);
        assert_eq!(calculate_score(0.0, 0, Some(89), 0), 10);
        assert_eq!(calculate_score(0.0, 0, Some(179), 0), 5);
        assert_eq!(calculate_score(0.0, 0, Some(181), 0), 0);
        assert_eq!(calculate_score(0.0, 0, None, 0), 0);
    }

    #[test]
    fn score_is_bounded() {
        let score = calculate_score(1_000_000.0, 1_000, Some(1), 1_000);
        assert!(score <= 100);
        assert!(calculate_score(0.0, 0, None, 0) >= 0);
    }

    #[test]
    fn whatsapp_number_normalization() {
        let mut c = Customer::new(Uuid::new_v4(), "a@b.com".into());
        c.phone = Some("(11) 98765-4321".into());
        assert_eq!(c.whatsapp_number().as_deref(), Some("5511987654321"));

        c.phone = Some("5511987654321".into());
        assert_eq!(c.whatsapp_number().as_deref(), Some("5511987654321"));

        c.phone = Some("1234".into());
        assert_eq!(c.whatsapp_number(), None);

        c.phone = None;
        assert_eq!(c.whatsapp_number(), None);
    }

    #[test]
    fn full_name_falls_back_to_email_local_part() {
        let mut c = Customer::new(Uuid::new_v4(), "joana@example.com".into());
        assert_eq!(c.full_name(), "joana");
        c.first_name = Some("Joana".into());
        c.last_name = Some("Silva".into());
        assert_eq!(c.full_name(), "Joana Silva");
    }

    #[test]
    fn refresh_derived_updates_both_fields() {
        let mut c = Customer::new(Uuid::new_v4(), "x@y.com".into());
        c.completed_orders = 12;
        c.total_spent = 1200.0;
        c.days_since_last_purchase = Some(10);
        c.refresh_derived();
        assert_eq!(c.status, CustomerStatus::Vip);
        assert_eq!(c.score, 62);
    }
}
