//! End-to-end exercises of the initiate -> callback -> settle pipeline against a real Sqlite store.
use chrono::{Duration, Utc};
use log::*;
use mobile_payment_engine::{
    db_types::*,
    events::{EventHandlers, EventHooks, EventProducers},
    test_utils::prepare_env::prepare_test_env,
    traits::{PaymentStore, PaymentStoreError, PushAcknowledgement, PushError, PushGateway, PushRequest},
    ApplyOutcome,
    GatewayLimits,
    InitiateError,
    ReconciliationApi,
    SqliteDatabase,
    StkPushInitiator,
};
use mpg_common::Money;

#[derive(Clone)]
struct StubGateway;

impl PushGateway for StubGateway {
    async fn push(&self, request: &PushRequest) -> Result<PushAcknowledgement, PushError> {
        Ok(PushAcknowledgement {
            gateway_reference: format!("ws_CO_{}_{}", request.order_id.as_str(), rand::random::<u32>()),
            description: "Success. Request accepted for processing".to_string(),
        })
    }
}

fn limits() -> GatewayLimits {
    GatewayLimits {
        min_amount: Money::from_shillings(1),
        max_amount: Money::from_shillings(150_000),
        shortcode: "174379".to_string(),
    }
}

async fn new_test_db() -> SqliteDatabase {
    let url = mobile_payment_engine::test_utils::prepare_env::random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn initiator(db: SqliteDatabase) -> StkPushInitiator<SqliteDatabase, StubGateway> {
    StkPushInitiator::new(db, StubGateway, limits(), Duration::seconds(30))
}

fn success_callback(reference: &str, amount: Money) -> CallbackEvent {
    CallbackEvent {
        gateway_reference: reference.to_string(),
        outcome: CallbackOutcome::Success,
        amount_confirmed: Some(amount),
        failure_reason: None,
        received_at: Utc::now(),
        raw_payload: serde_json::json!({"ResultCode": 0, "ResultDesc": "The service request is processed successfully."}),
    }
}

fn failure_callback(reference: &str, reason: &str) -> CallbackEvent {
    CallbackEvent {
        gateway_reference: reference.to_string(),
        outcome: CallbackOutcome::Failure,
        amount_confirmed: None,
        failure_reason: Some(reason.to_string()),
        received_at: Utc::now(),
        raw_payload: serde_json::json!({"ResultCode": 1032, "ResultDesc": reason}),
    }
}

#[tokio::test]
async fn success_callback_completes_order_and_duplicates_are_ignored() {
    let db = new_test_db().await;
    let api = ReconciliationApi::new(db.clone(), EventProducers::default());
    let order_id = OrderId::from("ord-1001".to_string());
    let amount = Money::from_shillings(500);

    let transaction = initiator(db.clone()).initiate(order_id.clone(), amount, "254708374149".into()).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Initiated);
    assert_eq!(transaction.attempt_count, 1);
    let reference = transaction.gateway_reference.clone().unwrap();

    let outcome = api.apply(success_callback(&reference, amount)).await.unwrap();
    let settled = match outcome {
        ApplyOutcome::Reconciled(t) => t,
        other => panic!("Expected Reconciled, got {other:?}"),
    };
    assert_eq!(settled.status, TransactionStatus::Completed);
    let order = db.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);

    // The gateway redelivers. Nothing changes.
    let duplicate = api.apply(success_callback(&reference, amount)).await.unwrap();
    assert!(matches!(duplicate, ApplyOutcome::AlreadyReconciled));
    let unchanged = db.fetch_transaction_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TransactionStatus::Completed);
    info!("🚀️ Success flow test complete");
}

#[tokio::test]
async fn amount_mismatch_settles_as_failed_without_paying_the_order() {
    let db = new_test_db().await;
    let api = ReconciliationApi::new(db.clone(), EventProducers::default());
    let order_id = OrderId::from("ord-1002".to_string());

    let transaction =
        initiator(db.clone()).initiate(order_id.clone(), Money::from_shillings(500), "254708374149".into()).await.unwrap();
    let reference = transaction.gateway_reference.clone().unwrap();

    let outcome = api.apply(success_callback(&reference, Money::from_shillings(400))).await.unwrap();
    let settled = match outcome {
        ApplyOutcome::Reconciled(t) => t,
        other => panic!("Expected Reconciled, got {other:?}"),
    };
    assert_eq!(settled.status, TransactionStatus::Failed);
    assert_eq!(settled.failure_reason.as_deref(), Some(AMOUNT_MISMATCH));
    let order = db.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn failed_payment_can_be_reinitiated_with_a_higher_attempt_count() {
    let db = new_test_db().await;
    let api = ReconciliationApi::new(db.clone(), EventProducers::default());
    let order_id = OrderId::from("ord-1003".to_string());
    let amount = Money::from_shillings(750);
    let initiator = initiator(db.clone());

    let first = initiator.initiate(order_id.clone(), amount, "254708374149".into()).await.unwrap();
    let reference = first.gateway_reference.clone().unwrap();
    let outcome = api.apply(failure_callback(&reference, "Request cancelled by user")).await.unwrap();
    let settled = match outcome {
        ApplyOutcome::Reconciled(t) => t,
        other => panic!("Expected Reconciled, got {other:?}"),
    };
    assert_eq!(settled.status, TransactionStatus::Failed);
    assert_eq!(settled.failure_reason.as_deref(), Some("Request cancelled by user"));

    // The payer fixes their phone and tries again.
    let second = initiator.initiate(order_id.clone(), amount, "254708374149".into()).await.unwrap();
    assert_eq!(second.status, TransactionStatus::Initiated);
    assert_eq!(second.attempt_count, 2);
    let reference = second.gateway_reference.clone().unwrap();
    let outcome = api.apply(success_callback(&reference, amount)).await.unwrap();
    assert!(matches!(outcome, ApplyOutcome::Reconciled(_)));
    let order = db.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn unknown_reference_is_recorded_as_an_orphan() {
    let db = new_test_db().await;
    let api = ReconciliationApi::new(db.clone(), EventProducers::default());

    let outcome = api.apply(success_callback("ws_CO_never_initiated", Money::from_shillings(100))).await.unwrap();
    assert!(matches!(outcome, ApplyOutcome::Orphan));
    assert_eq!(db.count_orphan_callbacks().await.unwrap(), 1);

    // The recorded payload can be read back for support follow-up.
    let orphans = db.fetch_orphan_callbacks(10).await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].gateway_reference, "ws_CO_never_initiated");
    assert!(orphans[0].payload.contains("ResultCode"));
}

#[tokio::test]
async fn stale_transactions_are_swept_once_and_late_callbacks_lose() {
    let db = new_test_db().await;
    let api = ReconciliationApi::new(db.clone(), EventProducers::default());
    let order_id = OrderId::from("ord-1004".to_string());
    let amount = Money::from_shillings(250);

    let transaction = initiator(db.clone()).initiate(order_id.clone(), amount, "254708374149".into()).await.unwrap();
    let reference = transaction.gateway_reference.clone().unwrap();

    // Let the transaction age past a zero-second deadline.
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    let swept = api.sweep_stale(Duration::zero()).await.unwrap();
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].status, TransactionStatus::TimedOut);

    // A second sweep finds nothing: the first one already owns the outcome.
    let swept_again = api.sweep_stale(Duration::zero()).await.unwrap();
    assert!(swept_again.is_empty());

    // The callback finally arrives, too late. The timeout is immutable and the order stays unpaid.
    let late = api.apply(success_callback(&reference, amount)).await.unwrap();
    assert!(matches!(late, ApplyOutcome::AlreadyReconciled));
    let unchanged = db.fetch_transaction_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(unchanged.status, TransactionStatus::TimedOut);
    let order = db.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn out_of_range_amounts_are_refused_before_the_gateway_is_called() {
    let db = new_test_db().await;
    let order_id = OrderId::from("ord-1005".to_string());

    let err = initiator(db.clone())
        .initiate(order_id.clone(), Money::from_shillings(200_000), "254708374149".into())
        .await
        .unwrap_err();
    assert!(matches!(err, InitiateError::AmountOutOfRange { .. }));
    assert!(db.fetch_transaction_for_order(&order_id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_references_and_initiations_map_to_distinct_errors() {
    let db = new_test_db().await;
    let first =
        NewTransaction::new(OrderId::from("ord-1010".to_string()), "ws_CO_dup_ref".to_string(), Money::from_shillings(10));
    db.insert_transaction(first).await.unwrap();

    // Same gateway reference, different order.
    let clash =
        NewTransaction::new(OrderId::from("ord-1011".to_string()), "ws_CO_dup_ref".to_string(), Money::from_shillings(10));
    let err = db.insert_transaction(clash).await.unwrap_err();
    assert!(matches!(err, PaymentStoreError::TransactionAlreadyExists(r) if r == "ws_CO_dup_ref"));

    // Same order, fresh reference, while the first attempt is still Initiated.
    let second_attempt =
        NewTransaction::new(OrderId::from("ord-1010".to_string()), "ws_CO_fresh_ref".to_string(), Money::from_shillings(10));
    let err = db.insert_transaction(second_attempt).await.unwrap_err();
    assert!(matches!(err, PaymentStoreError::DuplicateInitiation(o) if o.as_str() == "ord-1010"));
}

#[tokio::test]
async fn settled_writes_are_visible_through_a_second_pool() {
    let db = new_test_db().await;
    // A second pool over the same file guarantees the read runs on a different connection than the write.
    let reader = SqliteDatabase::new_with_url(db.url(), 2).await.unwrap();
    let order_id = OrderId::from("ord-1007".to_string());

    db.upsert_order(&order_id, Money::from_shillings(10)).await.unwrap();
    db.mark_order_paid(&order_id).await.unwrap();

    let order = reader.fetch_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn redelivered_callback_repairs_a_missed_order_update() {
    let db = new_test_db().await;
    let api = ReconciliationApi::new(db.clone(), EventProducers::default());
    let order_id = OrderId::from("ord-1008".to_string());
    let amount = Money::from_shillings(300);
    let transaction = initiator(db.clone()).initiate(order_id.clone(), amount, "254708374149".into()).await.unwrap();
    let reference = transaction.gateway_reference.clone().unwrap();

    // Settle the transaction directly, as if the process died between the status write and the order update.
    let event = success_callback(&reference, amount);
    let updated = db
        .update_status_if_initiated(transaction.id, TransactionStatus::Completed, None, &event.digest())
        .await
        .unwrap();
    assert!(updated.is_some());
    assert_eq!(db.fetch_order(&order_id).await.unwrap().unwrap().status, OrderStatusType::Pending);

    // The gateway redelivers. The duplicate finishes the order update before being acknowledged.
    let outcome = api.apply(event).await.unwrap();
    assert!(matches!(outcome, ApplyOutcome::AlreadyReconciled));
    assert_eq!(db.fetch_order(&order_id).await.unwrap().unwrap().status, OrderStatusType::Paid);
}

/// Delegates everything to the real store but refuses to release reservations, as a store hiccup would.
#[derive(Clone)]
struct StickyReservationStore(SqliteDatabase);

impl PaymentStore for StickyReservationStore {
    fn url(&self) -> &str {
        self.0.url()
    }

    async fn insert_transaction(&self, transaction: NewTransaction) -> Result<PaymentTransaction, PaymentStoreError> {
        self.0.insert_transaction(transaction).await
    }

    async fn fetch_transaction_by_reference(
        &self,
        gateway_reference: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        self.0.fetch_transaction_by_reference(gateway_reference).await
    }

    async fn fetch_transaction_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        self.0.fetch_transaction_for_order(order_id).await
    }

    async fn has_initiated_transaction(&self, order_id: &OrderId) -> Result<bool, PaymentStoreError> {
        self.0.has_initiated_transaction(order_id).await
    }

    async fn update_status_if_initiated(
        &self,
        transaction_id: i64,
        new_status: TransactionStatus,
        failure_reason: Option<String>,
        callback_digest: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        self.0.update_status_if_initiated(transaction_id, new_status, failure_reason, callback_digest).await
    }

    async fn sweep_stale_transactions(
        &self,
        older_than: Duration,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        self.0.sweep_stale_transactions(older_than).await
    }

    async fn acquire_initiation_reservation(
        &self,
        order_id: &OrderId,
        ttl: Duration,
    ) -> Result<bool, PaymentStoreError> {
        self.0.acquire_initiation_reservation(order_id, ttl).await
    }

    async fn release_initiation_reservation(&self, _order_id: &OrderId) -> Result<(), PaymentStoreError> {
        Err(PaymentStoreError::DatabaseError("Connection lost".to_string()))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        self.0.fetch_order(order_id).await
    }

    async fn upsert_order(&self, order_id: &OrderId, amount: Money) -> Result<Order, PaymentStoreError> {
        self.0.upsert_order(order_id, amount).await
    }

    async fn mark_order_paid(&self, order_id: &OrderId) -> Result<Order, PaymentStoreError> {
        self.0.mark_order_paid(order_id).await
    }

    async fn record_orphan_callback(&self, event: &CallbackEvent) -> Result<(), PaymentStoreError> {
        self.0.record_orphan_callback(event).await
    }

    async fn count_orphan_callbacks(&self) -> Result<i64, PaymentStoreError> {
        self.0.count_orphan_callbacks().await
    }

    async fn fetch_orphan_callbacks(&self, limit: i64) -> Result<Vec<OrphanCallback>, PaymentStoreError> {
        self.0.fetch_orphan_callbacks(limit).await
    }
}

#[derive(Clone)]
struct RejectingGateway;

impl PushGateway for RejectingGateway {
    async fn push(&self, _request: &PushRequest) -> Result<PushAcknowledgement, PushError> {
        Err(PushError::Rejected("Invalid PhoneNumber".to_string()))
    }
}

#[tokio::test]
async fn gateway_rejection_is_reported_even_when_the_release_fails() {
    let db = StickyReservationStore(new_test_db().await);
    let init = StkPushInitiator::new(db, RejectingGateway, limits(), Duration::seconds(30));
    let err = init
        .initiate(OrderId::from("ord-1009".to_string()), Money::from_shillings(50), "254708374149".into())
        .await
        .unwrap_err();
    assert!(matches!(err, InitiateError::GatewayRejected(_)));
}

#[tokio::test]
async fn completed_payment_emits_a_payment_completed_event() {
    let db = new_test_db().await;
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let mut hooks = EventHooks::default();
    hooks.on_payment_completed(move |event| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(event).await;
        })
    });
    let handlers = EventHandlers::new(10, hooks);
    let api = ReconciliationApi::new(db.clone(), handlers.producers());
    handlers.start_handlers().await;

    let order_id = OrderId::from("ord-1006".to_string());
    let amount = Money::from_shillings(999);
    let transaction = initiator(db.clone()).initiate(order_id.clone(), amount, "254708374149".into()).await.unwrap();
    let reference = transaction.gateway_reference.clone().unwrap();
    api.apply(success_callback(&reference, amount)).await.unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for the payment completed event")
        .expect("Event channel closed without delivering");
    assert_eq!(event.order_id, order_id);
    assert_eq!(event.amount, amount);
    assert_eq!(event.transaction_id, transaction.id);
}
