use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use mobile_payment_engine::{
    db_types::{PaymentTransaction, TransactionStatus},
    SqliteDatabase,
};
use mpg_common::Money;

use super::helpers::{new_test_db, seed_initiated_payment, test_initiator, TestGateway};
use crate::routes::{health, initiate_payment, payment_status};

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(health)).await;
    let req = TestRequest::get().uri("/health").to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
}

#[actix_web::test]
async fn initiating_a_payment_returns_the_pending_transaction() {
    let db = new_test_db().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(test_initiator(db.clone())))
            .route("/payments", web::post().to(initiate_payment::<SqliteDatabase, TestGateway>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/payments")
        .set_json(serde_json::json!({ "order_id": "ord-2001", "amount": 500, "msisdn": "254708374149" }))
        .to_request();
    let transaction: PaymentTransaction = test::call_and_read_body_json(&app, req).await;
    assert_eq!(transaction.status, TransactionStatus::Initiated);
    assert_eq!(transaction.amount, Money::from_shillings(500));
    assert_eq!(transaction.gateway_reference.as_deref(), Some("ws_CO_test_ord-2001"));
}

#[actix_web::test]
async fn initiating_twice_is_a_conflict() {
    let db = new_test_db().await;
    seed_initiated_payment(&db, "ord-2002", Money::from_shillings(100)).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(test_initiator(db.clone())))
            .route("/payments", web::post().to(initiate_payment::<SqliteDatabase, TestGateway>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/payments")
        .set_json(serde_json::json!({ "order_id": "ord-2002", "amount": 100, "msisdn": "254708374149" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn out_of_range_amount_is_a_bad_request() {
    let db = new_test_db().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(test_initiator(db.clone())))
            .route("/payments", web::post().to(initiate_payment::<SqliteDatabase, TestGateway>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/payments")
        .set_json(serde_json::json!({ "order_id": "ord-2003", "amount": 200_000, "msisdn": "254708374149" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn payment_status_is_queryable_by_order_id() {
    let db = new_test_db().await;
    let seeded = seed_initiated_payment(&db, "ord-2004", Money::from_shillings(250)).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(db.clone()))
            .route("/payments/{order_id}", web::get().to(payment_status::<SqliteDatabase>)),
    )
    .await;
    let req = TestRequest::get().uri("/payments/ord-2004").to_request();
    let found: PaymentTransaction = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.id, seeded.id);
    assert_eq!(found.status, TransactionStatus::Initiated);

    let req = TestRequest::get().uri("/payments/no-such-order").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
