use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use mobile_payment_engine::{
    db_types::{OrderId, TransactionStatus},
    events::EventProducers,
    traits::PaymentStore,
    ReconciliationApi,
    SqliteDatabase,
};
use mpg_common::{Money, Secret};

use super::helpers::{new_test_db, seed_initiated_payment, test_limits};
use crate::{
    callback_routes::{gateway_confirmation, gateway_result, gateway_timeout, gateway_validation},
    data_objects::GatewayDecision,
    helpers::calculate_hmac,
    middleware::{HmacMiddlewareFactory, HMAC_HEADER},
};

fn stk_result_body(reference: &str, result_code: i64, amount: Option<f64>) -> serde_json::Value {
    let mut callback = serde_json::json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": reference,
        "ResultCode": result_code,
        "ResultDesc": if result_code == 0 { "The service request is processed successfully." } else { "Request cancelled by user" },
    });
    if let Some(amount) = amount {
        callback["CallbackMetadata"] = serde_json::json!({ "Item": [
            { "Name": "Amount", "Value": amount },
            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" }
        ]});
    }
    serde_json::json!({ "Body": { "stkCallback": callback } })
}

#[actix_web::test]
async fn successful_result_callback_settles_the_transaction() {
    let db = new_test_db().await;
    let seeded = seed_initiated_payment(&db, "ord-3001", Money::from_shillings(500)).await;
    let reference = seeded.gateway_reference.clone().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ReconciliationApi::new(db.clone(), EventProducers::default())))
            .route("/gateway/result", web::post().to(gateway_result::<SqliteDatabase>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/gateway/result")
        .set_json(stk_result_body(&reference, 0, Some(500.0)))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let settled = db.fetch_transaction_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(settled.status, TransactionStatus::Completed);
}

#[actix_web::test]
async fn malformed_result_callback_is_a_bad_request() {
    let db = new_test_db().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ReconciliationApi::new(db.clone(), EventProducers::default())))
            .route("/gateway/result", web::post().to(gateway_result::<SqliteDatabase>)),
    )
    .await;
    // Valid JSON, wrong shape.
    let req = TestRequest::post()
        .uri("/gateway/result")
        .set_json(serde_json::json!({ "NotTheBody": true }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn timeout_notice_fails_the_transaction() {
    let db = new_test_db().await;
    let seeded = seed_initiated_payment(&db, "ord-3002", Money::from_shillings(100)).await;
    let reference = seeded.gateway_reference.clone().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ReconciliationApi::new(db.clone(), EventProducers::default())))
            .route("/gateway/timeout", web::post().to(gateway_timeout::<SqliteDatabase>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/gateway/timeout")
        .set_json(serde_json::json!({ "CheckoutRequestID": reference, "ResultDesc": "DS timeout user cannot be reached" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let settled = db.fetch_transaction_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(settled.status, TransactionStatus::Failed);
    assert_eq!(settled.failure_reason.as_deref(), Some("DS timeout user cannot be reached"));
}

#[actix_web::test]
async fn confirmation_callback_completes_via_bill_ref_number() {
    let db = new_test_db().await;
    seed_initiated_payment(&db, "ord-3003", Money::from_shillings(750)).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ReconciliationApi::new(db.clone(), EventProducers::default())))
            .app_data(web::Data::new(db.clone()))
            .route("/gateway/confirmation", web::post().to(gateway_confirmation::<SqliteDatabase>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/gateway/confirmation")
        .set_json(serde_json::json!({
            "TransID": "NLJ7RT61SV",
            "TransAmount": "750.00",
            "BusinessShortCode": "174379",
            "BillRefNumber": "ord-3003",
            "MSISDN": "254708374149"
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let order_id = OrderId::from("ord-3003".to_string());
    let settled = db.fetch_transaction_for_order(&order_id).await.unwrap().unwrap();
    assert_eq!(settled.status, TransactionStatus::Completed);
}

#[actix_web::test]
async fn confirmation_for_unknown_order_is_acknowledged_and_recorded() {
    let db = new_test_db().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ReconciliationApi::new(db.clone(), EventProducers::default())))
            .app_data(web::Data::new(db.clone()))
            .route("/gateway/confirmation", web::post().to(gateway_confirmation::<SqliteDatabase>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/gateway/confirmation")
        .set_json(serde_json::json!({
            "TransID": "NLJ7RT61SV",
            "TransAmount": "100.00",
            "BusinessShortCode": "174379",
            "BillRefNumber": "never-heard-of-it"
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    assert_eq!(db.count_orphan_callbacks().await.unwrap(), 1);
}

#[actix_web::test]
async fn validation_decisions_follow_the_limits() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(test_limits()))
            .route("/gateway/validation", web::post().to(gateway_validation)),
    )
    .await;
    let accept_req = TestRequest::post()
        .uri("/gateway/validation")
        .set_json(serde_json::json!({
            "TransID": "NLJ7RT61SV",
            "TransAmount": "500.00",
            "BusinessShortCode": "174379",
            "BillRefNumber": "ord-3004"
        }))
        .to_request();
    let decision: GatewayDecision = test::call_and_read_body_json(&app, accept_req).await;
    assert_eq!(decision.result_code, "0");

    let reject_req = TestRequest::post()
        .uri("/gateway/validation")
        .set_json(serde_json::json!({
            "TransID": "NLJ7RT61SV",
            "TransAmount": "500000.00",
            "BusinessShortCode": "174379",
            "BillRefNumber": "ord-3004"
        }))
        .to_request();
    let decision: GatewayDecision = test::call_and_read_body_json(&app, reject_req).await;
    assert_eq!(decision.result_code, "C2B00012");
}

#[actix_web::test]
async fn unsigned_callbacks_are_rejected_when_hmac_checks_are_on() {
    let secret = "test-callback-secret";
    let body = serde_json::json!({
        "TransID": "NLJ7RT61SV",
        "TransAmount": "500.00",
        "BusinessShortCode": "174379",
        "BillRefNumber": "ord-3005"
    })
    .to_string();
    let app = test::init_service(
        App::new().app_data(web::Data::new(test_limits())).service(
            web::scope("/gateway")
                .wrap(HmacMiddlewareFactory::new(HMAC_HEADER, Secret::new(secret.to_string()), true))
                .route("/validation", web::post().to(gateway_validation)),
        ),
    )
    .await;

    let unsigned = TestRequest::post()
        .uri("/gateway/validation")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.clone())
        .to_request();
    match test::try_call_service(&app, unsigned).await {
        Ok(res) => assert_eq!(res.status(), StatusCode::FORBIDDEN),
        Err(e) => assert_eq!(e.as_response_error().status_code(), StatusCode::FORBIDDEN),
    }

    let signature = calculate_hmac(secret, body.as_bytes());
    let signed = TestRequest::post()
        .uri("/gateway/validation")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((HMAC_HEADER, signature))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, signed).await;
    assert!(res.status().is_success());
}
