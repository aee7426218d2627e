//! End-to-end import pipeline tests on an in-memory store and a fixture
//! source: cart and order ingestion, identity merge, recovery attribution,
//! and the derived customer analysis.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use cartrec_common::JobStatus;
use cartrec_import::db;
use cartrec_import::import::progress::{MemorySink, ProgressReporter};
use cartrec_import::import::{run_commerce_import, run_leads_import, ImportType};
use cartrec_import::models::{CartStatus, CustomerStatus, Tenant};
use cartrec_import::recovery::RecoveryPolicy;
use cartrec_import::source::{CartEventRow, DateRange, FixtureSource, LeadRow, OrderRow};

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::init_tables(&pool).await.expect("Failed to init tables");
    pool
}

async fn seed_tenant(pool: &SqlitePool) -> Tenant {
    let tenant = Tenant::new("Test Store", "test-store");
    db::tenants::save_tenant(pool, &tenant).await.unwrap();
    tenant
}

fn ts(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap()
}

fn range_for_january() -> DateRange {
    DateRange::new(ts(1, 1), ts(2, 28))
}

/// One abandoned cart on Jan 1, one completed order by the same customer on
/// Jan 15: the cart must come out recovered and the customer first_time.
fn recovery_fixture() -> FixtureSource {
    FixtureSource {
        carts: vec![CartEventRow {
            checkout_id: "101".into(),
            email: Some("Maria@Example.com".into()),
            cart_contents: Some(
                r#"{"x":{"product_id": 7, "variation_id": 0, "quantity": 2}}"#.into(),
            ),
            cart_total: Some("250,00".into()),
            session_id: Some("sess-1".into()),
            other_fields: Some(
                r#"{"billing_phone": "11987654321", "billing_first_name": "Maria"}"#.into(),
            ),
            order_status: Some("abandoned".into()),
            captured_at: ts(1, 1),
        }],
        orders: vec![OrderRow {
            order_id: "5001".into(),
            created_at: Some(ts(1, 15)),
            status: Some("wc-completed".into()),
            email: Some("maria@example.com".into()),
            phone: None,
            first_name: Some("Maria".into()),
            last_name: Some("Silva".into()),
            total: Some("240.00".into()),
        }],
        leads: vec![],
    }
}

async fn run_all(pool: &SqlitePool, tenant: &Tenant, source: &FixtureSource) -> cartrec_common::JobSummary {
    let sink = MemorySink::default();
    let mut reporter = ProgressReporter::new(&sink, Uuid::new_v4());
    run_commerce_import(
        pool,
        tenant,
        source,
        range_for_january(),
        ImportType::All,
        RecoveryPolicy::default(),
        &mut reporter,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn abandoned_cart_followed_by_order_is_recovered() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    let summary = run_all(&pool, &tenant, &recovery_fixture()).await;

    assert_eq!(summary.status, JobStatus::Done);
    assert_eq!(summary.recovered_count, 1);
    assert_eq!(summary.abandoned_count, 0);
    assert_eq!(summary.recovery_rate, 1.0);
    assert_eq!(summary.recovered_value, 240.0);

    let cart = db::carts::load_cart(&pool, tenant.id, "101")
        .await
        .unwrap()
        .expect("cart not stored");
    assert_eq!(cart.status, CartStatus::Recovered);
    assert!(cart.was_recovered);
    assert_eq!(cart.recovered_order_id.as_deref(), Some("5001"));
    assert_eq!(cart.recovered_at, Some(ts(1, 15)));
    // comma-decimal source total was coerced
    assert_eq!(cart.cart_total, 250.0);
    assert_eq!(cart.items_count, 2);
    assert_eq!(cart.cart_contents[0].product_id, 7);
}

#[tokio::test]
async fn customer_is_merged_across_cart_and_order_sources() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    run_all(&pool, &tenant, &recovery_fixture()).await;

    // email was normalized to lowercase and the two fragments merged
    let customer = db::customers::load_customer_by_email(&pool, tenant.id, "maria@example.com")
        .await
        .unwrap()
        .expect("customer not stored");

    // phone came from the cart pass, last name from the order pass;
    // first name kept the cart's value (first non-empty wins)
    assert_eq!(customer.phone.as_deref(), Some("11987654321"));
    assert_eq!(customer.first_name.as_deref(), Some("Maria"));
    assert_eq!(customer.last_name.as_deref(), Some("Silva"));

    assert_eq!(customer.total_orders, 1);
    assert_eq!(customer.completed_orders, 1);
    assert_eq!(customer.total_spent, 240.0);
    assert_eq!(customer.total_carts, 1);
    assert_eq!(customer.recovered_carts, 1);
    assert_eq!(customer.status, CustomerStatus::FirstTime);
    assert_eq!(customer.first_seen, Some(ts(1, 1)));
    assert_eq!(customer.first_purchase, Some(ts(1, 15)));
}

#[tokio::test]
async fn rerun_over_same_data_is_idempotent() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;
    let fixture = recovery_fixture();

    let first = run_all(&pool, &tenant, &fixture).await;
    assert_eq!(first.stats.created, 2); // one cart, one order
    assert_eq!(first.recovered_count, 1);

    let second = run_all(&pool, &tenant, &fixture).await;
    assert_eq!(second.stats.created, 0);
    assert_eq!(second.stats.updated, 2);
    // the cart is already finalized; nothing to attribute
    assert_eq!(second.recovered_count, 0);
    assert_eq!(second.pending_count, 0);

    let customers = db::customers::load_customers_for_tenant(&pool, tenant.id)
        .await
        .unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].total_carts, 1);
    assert_eq!(customers[0].total_orders, 1);
}

#[tokio::test]
async fn refund_reimport_clears_purchase_history() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    run_all(&pool, &tenant, &recovery_fixture()).await;

    // same order comes back refunded on the next run
    let mut refunded = recovery_fixture();
    refunded.orders[0].status = Some("wc-refunded".into());
    run_all(&pool, &tenant, &refunded).await;

    let customer = db::customers::load_customer_by_email(&pool, tenant.id, "maria@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.completed_orders, 0);
    assert_eq!(customer.total_spent, 0.0);
    assert_eq!(customer.average_order_value, 0.0);
    assert_eq!(customer.first_purchase, None);
    assert_eq!(customer.last_purchase, None);
    assert_eq!(customer.days_since_last_purchase, None);
    assert_eq!(customer.status, CustomerStatus::NeverBought);
}

#[tokio::test]
async fn old_cart_without_order_is_finally_abandoned() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    // cart 35+ days in the past, no orders at all
    let fixture = FixtureSource {
        carts: vec![CartEventRow {
            checkout_id: "201".into(),
            email: Some("gone@example.com".into()),
            cart_total: Some("80.00".into()),
            captured_at: Utc::now() - chrono::Duration::days(35),
            ..Default::default()
        }],
        ..Default::default()
    };

    let summary = run_all(&pool, &tenant, &fixture).await;
    assert_eq!(summary.abandoned_count, 1);
    assert_eq!(summary.recovery_rate, 0.0);

    let customer = db::customers::load_customer_by_email(&pool, tenant.id, "gone@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.status, CustomerStatus::AbandonedOnly);
    assert_eq!(customer.abandoned_carts, 1);
    assert_eq!(customer.total_abandoned_value, 80.0);
}

#[tokio::test]
async fn fresh_cart_without_order_stays_pending() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    let fixture = FixtureSource {
        carts: vec![CartEventRow {
            checkout_id: "301".into(),
            email: Some("maybe@example.com".into()),
            captured_at: Utc::now() - chrono::Duration::days(2),
            ..Default::default()
        }],
        ..Default::default()
    };

    let summary = run_all(&pool, &tenant, &fixture).await;
    assert_eq!(summary.pending_count, 1);
    assert_eq!(summary.recovered_count, 0);
    assert_eq!(summary.abandoned_count, 0);

    let cart = db::carts::load_cart(&pool, tenant.id, "301")
        .await
        .unwrap()
        .unwrap();
    assert!(!cart.was_recovered);
    assert_eq!(cart.status, CartStatus::Active);
}

#[tokio::test]
async fn rows_without_email_are_skipped_not_fatal() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    let fixture = FixtureSource {
        carts: vec![
            CartEventRow {
                checkout_id: "401".into(),
                email: None,
                captured_at: ts(1, 5),
                ..Default::default()
            },
            CartEventRow {
                checkout_id: "402".into(),
                email: Some("ok@example.com".into()),
                captured_at: ts(1, 5),
                ..Default::default()
            },
        ],
        orders: vec![OrderRow {
            order_id: "6001".into(),
            created_at: Some(ts(1, 6)),
            status: Some("wc-completed".into()),
            email: Some("".into()),
            ..Default::default()
        }],
        leads: vec![],
    };

    let summary = run_all(&pool, &tenant, &fixture).await;
    assert_eq!(summary.status, JobStatus::Done);
    assert_eq!(summary.stats.created, 1);
    assert_eq!(summary.stats.skipped, 2);
    assert_eq!(summary.stats.errored, 0);
}

#[tokio::test]
async fn corrupt_cart_blob_still_imports_the_row() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    let fixture = FixtureSource {
        carts: vec![CartEventRow {
            checkout_id: "501".into(),
            email: Some("blob@example.com".into()),
            // truncated PHP-serialized payload; the regex pass salvages items
            cart_contents: Some(
                "a:1:{s:3:\"abc\";a:2:{s:10:\"product_id\";i:55;s:8:\"quantity\";i:3;".into(),
            ),
            cart_total: Some("not-a-number".into()),
            captured_at: ts(1, 10),
            ..Default::default()
        }],
        ..Default::default()
    };

    let summary = run_all(&pool, &tenant, &fixture).await;
    assert_eq!(summary.stats.created, 1);

    let cart = db::carts::load_cart(&pool, tenant.id, "501")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cart.cart_contents.len(), 1);
    assert_eq!(cart.cart_contents[0].product_id, 55);
    assert_eq!(cart.items_count, 3);
    // malformed money coerces to zero instead of failing the record
    assert_eq!(cart.cart_total, 0.0);
}

#[tokio::test]
async fn progress_is_monotonic_and_terminal() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    let sink = MemorySink::default();
    let job_id = Uuid::new_v4();
    let mut reporter = ProgressReporter::new(&sink, job_id);
    run_commerce_import(
        &pool,
        &tenant,
        &recovery_fixture(),
        range_for_january(),
        ImportType::All,
        RecoveryPolicy::default(),
        &mut reporter,
    )
    .await
    .unwrap();

    let history = sink.history(job_id);
    assert!(!history.is_empty());
    let progresses: Vec<u8> = history.iter().map(|s| s.progress).collect();
    assert!(progresses.windows(2).all(|w| w[0] <= w[1]));
    let last = history.last().unwrap();
    assert_eq!(last.status, JobStatus::Done);
    assert_eq!(last.progress, 100);
}

#[tokio::test]
async fn lead_run_links_leads_to_imported_customers() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    // commerce import first, so the customer exists with a phone
    run_all(&pool, &tenant, &recovery_fixture()).await;

    let fixture = FixtureSource {
        leads: vec![
            LeadRow {
                form_id: "901".into(),
                captured_at: ts(2, 1),
                name: Some("Maria".into()),
                phone: Some("(11) 98765-4321".into()),
                ..Default::default()
            },
            LeadRow {
                form_id: "902".into(),
                captured_at: ts(2, 1),
                name: Some("Stranger".into()),
                phone: Some("21900001111".into()),
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    let sink = MemorySink::default();
    let mut reporter = ProgressReporter::new(&sink, Uuid::new_v4());
    let summary = run_leads_import(&pool, &tenant, &fixture, range_for_january(), &mut reporter)
        .await
        .unwrap();
    assert_eq!(summary.stats.created, 2);

    let matched = db::leads::load_lead(&pool, tenant.id, "901")
        .await
        .unwrap()
        .unwrap();
    assert!(matched.is_customer);
    assert!(matched.customer_id.is_some());

    let unmatched = db::leads::load_lead(&pool, tenant.id, "902")
        .await
        .unwrap()
        .unwrap();
    assert!(!unmatched.is_customer);
    assert_eq!(unmatched.customer_id, None);
}

#[tokio::test]
async fn daily_rollup_reflects_the_customer_base() {
    let pool = test_pool().await;
    let tenant = seed_tenant(&pool).await;

    run_all(&pool, &tenant, &recovery_fixture()).await;

    let rollup = db::analysis::load_analysis(&pool, tenant.id, Utc::now().date_naive())
        .await
        .unwrap()
        .expect("rollup not written");
    assert_eq!(rollup.total_customers, 1);
    assert_eq!(rollup.first_time, 1);
    assert_eq!(rollup.total_carts, 1);
    assert_eq!(rollup.recovered_carts, 1);
    assert_eq!(rollup.total_revenue, 240.0);
    assert_eq!(rollup.conversion_rate, 1.0);
}
