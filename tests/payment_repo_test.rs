mod common;

use common::*;
use sqlx::PgPool;
use swag_pay::domain::error::CheckoutError;
use swag_pay::domain::id::{OrderId, PaymentId};
use swag_pay::domain::order::{CustomerInfo, NewOrder, OrderItem};
use swag_pay::domain::payment::{
    Environment, NewPaymentRecord, PaymentMethod, PaymentStatus, SettleResult, Settlement,
    SettlementSource,
};
use swag_pay::domain::reference::ReferenceCheck;
use swag_pay::domain::store::PaymentStore;
use swag_pay::infra::postgres::PgPaymentStore;

const DB: &str = "swag_pay_test_repo";

async fn store() -> (PgPool, PgPaymentStore) {
    let pool = setup_pool(DB).await;
    (pool.clone(), PgPaymentStore::new(pool))
}

async fn seed(store: &PgPaymentStore, method: PaymentMethod, external_id: &str) -> NewPaymentRecord {
    let order_id = OrderId::generate();
    let payment_id = PaymentId::generate();
    let order = NewOrder {
        order_id: order_id.clone(),
        payment_id: payment_id.clone(),
        method,
        amount_usd: usd("50.00"),
        amount_cop: None,
        items: vec![OrderItem {
            product_id: "hoodie".into(),
            name: "Hoodie".into(),
            quantity: 2,
            unit_price: 2500,
            variant: Some("M".into()),
        }],
        customer: CustomerInfo {
            email: Some("ana@example.com".into()),
            city: Some("Cali".into()),
            ..Default::default()
        },
    };
    let payment = NewPaymentRecord {
        payment_id,
        order_id,
        method,
        money: usd("50.00"),
        recipient: RECIPIENT.to_string(),
        environment: Environment::Test,
    };
    store.create_checkout(&order, &payment).await.unwrap();
    store
        .attach_external_id(&payment.payment_id, external_id, None)
        .await
        .unwrap();
    payment
}

async fn audit_actions(pool: &PgPool, payment_id: &PaymentId) -> Vec<String> {
    sqlx::query_scalar("SELECT action FROM audit_log WHERE entity_id = $1 ORDER BY created_at, id")
        .bind(payment_id.as_str())
        .fetch_all(pool)
        .await
        .unwrap()
}

fn completed(reference: &str, check: ReferenceCheck) -> Settlement {
    Settlement::Completed {
        reference: reference.to_string(),
        check,
        source: SettlementSource::Poller,
    }
}

// ── 1. create_and_find ─────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "needs a local postgres"]
async fn create_and_find() {
    let (_, store) = store().await;
    let payment = seed(&store, PaymentMethod::BasePay, "bp_repo_1").await;

    let record = store.find_payment(&payment.payment_id).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.external_id.as_deref(), Some("bp_repo_1"));
    assert_eq!(record.money.amount().cents(), 5000);
    assert_eq!(record.recipient, RECIPIENT);
    assert_eq!(record.environment, Environment::Test);

    let by_external = store
        .find_by_external_id(PaymentMethod::BasePay, "bp_repo_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_external.payment_id, payment.payment_id);

    assert!(store
        .find_by_external_id(PaymentMethod::Wompi, "bp_repo_1")
        .await
        .unwrap()
        .is_none());
}

// ── 2. attach_to_missing_payment ───────────────────────────────────────────

#[tokio::test]
#[ignore = "needs a local postgres"]
async fn attach_to_missing_payment() {
    let (_, store) = store().await;
    let err = store
        .attach_external_id(&PaymentId::new("payment_ghost").unwrap(), "x", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound(_)));
}

// ── 3. settle_applies_once ─────────────────────────────────────────────────

#[tokio::test]
#[ignore = "needs a local postgres"]
async fn settle_applies_once() {
    let (pool, store) = store().await;
    let payment = seed(&store, PaymentMethod::BasePay, "bp_repo_settle").await;

    let first = store
        .settle_if_pending(&payment.payment_id, &completed(HASH, ReferenceCheck::Verified))
        .await
        .unwrap();
    let SettleResult::Applied(record) = first else {
        panic!("first settlement must apply");
    };
    assert_eq!(record.status, PaymentStatus::Completed);
    assert_eq!(record.transaction_reference.as_deref(), Some(HASH));
    assert_eq!(record.reference_check, Some(ReferenceCheck::Verified));
    assert!(record.completed_at.is_some());

    let late = Settlement::Failed {
        reason: "expired".into(),
        source: SettlementSource::Webhook(PaymentMethod::BasePay),
    };
    let second = store
        .settle_if_pending(&payment.payment_id, &late)
        .await
        .unwrap();
    let SettleResult::AlreadyTerminal(record) = second else {
        panic!("second settlement must not apply");
    };
    assert_eq!(record.status, PaymentStatus::Completed);

    assert_eq!(
        audit_actions(&pool, &payment.payment_id).await,
        ["status_changed", "settlement_rejected"]
    );

    let order_status: String = sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1")
        .bind(payment.order_id.as_str())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(order_status, "completed");
}

// ── 4. settle_missing_payment ──────────────────────────────────────────────

#[tokio::test]
#[ignore = "needs a local postgres"]
async fn settle_missing_payment() {
    let (_, store) = store().await;
    let err = store
        .settle_if_pending(
            &PaymentId::new("payment_ghost").unwrap(),
            &completed(HASH, ReferenceCheck::Verified),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NotFound(_)));
}

// ── 5. malformed_reference_is_kept_and_flagged ─────────────────────────────

#[tokio::test]
#[ignore = "needs a local postgres"]
async fn malformed_reference_is_kept_and_flagged() {
    let (pool, store) = store().await;
    let payment = seed(&store, PaymentMethod::BasePay, "bp_repo_bad").await;

    store
        .settle_if_pending(&payment.payment_id, &completed("0xfeed", ReferenceCheck::Malformed))
        .await
        .unwrap();

    let record = store.find_payment(&payment.payment_id).await.unwrap().unwrap();
    assert_eq!(record.transaction_reference.as_deref(), Some("0xfeed"));
    assert_eq!(record.reference_check, Some(ReferenceCheck::Malformed));
    assert_eq!(
        audit_actions(&pool, &payment.payment_id).await,
        ["settled_malformed_reference"]
    );
}

// ── 6. order_summary ───────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "needs a local postgres"]
async fn order_summary_joins_order_and_payment() {
    let (_, store) = store().await;
    let payment = seed(&store, PaymentMethod::BasePay, "bp_repo_sum").await;
    store
        .settle_if_pending(&payment.payment_id, &completed(HASH, ReferenceCheck::Heuristic))
        .await
        .unwrap();

    let summary = store
        .order_summary(&payment.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.method, PaymentMethod::BasePay);
    assert_eq!(summary.total.to_major_string(), "50.00");
    assert_eq!(summary.items.len(), 1);
    assert_eq!(summary.items[0].quantity, 2);
    assert_eq!(summary.customer.city.as_deref(), Some("Cali"));
    assert_eq!(summary.reference_check, Some(ReferenceCheck::Heuristic));
    assert_eq!(summary.displayable_reference(), None);

    assert!(store
        .order_summary(&OrderId::new("order_ghost").unwrap())
        .await
        .unwrap()
        .is_none());
}
