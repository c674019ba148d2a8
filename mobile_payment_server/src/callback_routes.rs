//! The gateway callback endpoints.
//!
//! Callback handling discipline: the gateway retries any delivery that is not acknowledged with a 2xx, so every
//! semantically-handled callback (including duplicates and orphans) is answered 200. Only a structurally
//! malformed body earns a 400, and only a storage fault earns a 5xx (inviting a useful retry). All four
//! endpoints normalize their payload to a [`CallbackEvent`] and funnel it through [`ReconciliationApi::apply`].

use actix_web::{web, HttpResponse};
use log::*;
use mobile_payment_engine::{
    db_types::OrderId,
    decide_validation,
    traits::PaymentStore,
    ApplyOutcome,
    GatewayLimits,
    ReconciliationApi,
};

use crate::{
    callback_payloads::{C2bPayload, StkResultDocument, TimeoutNotice},
    data_objects::{GatewayDecision, JsonResponse},
    errors::ServerError,
};

/// `POST /gateway/result` — the STK push result callback.
pub async fn gateway_result<B: PaymentStore>(
    body: web::Json<serde_json::Value>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let raw = body.into_inner();
    let document: StkResultDocument = serde_json::from_value(raw.clone()).map_err(|e| {
        warn!("📥️ Malformed push result callback: {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let event = document.body.stk_callback.into_callback_event(raw);
    let outcome = api.apply(event).await?;
    Ok(acknowledge(outcome))
}

/// `POST /gateway/confirmation` — the C2B confirmation callback. The order reference travels in `BillRefNumber`;
/// it is resolved to the order's current transaction before the event enters the common pipeline. A reference
/// that resolves to nothing becomes an orphan, same as an unknown checkout id.
pub async fn gateway_confirmation<B: PaymentStore>(
    body: web::Json<serde_json::Value>,
    api: web::Data<ReconciliationApi<B>>,
    db: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let raw = body.into_inner();
    let payload: C2bPayload = serde_json::from_value(raw.clone()).map_err(|e| {
        warn!("📥️ Malformed confirmation callback: {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let order_id = OrderId::from(payload.bill_ref_number.clone());
    let gateway_reference = match db.fetch_transaction_for_order(&order_id).await? {
        Some(transaction) => {
            transaction.gateway_reference.unwrap_or_else(|| format!("c2b_{}", payload.trans_id))
        },
        None => {
            debug!("📥️ Confirmation {} references unknown order {order_id}", payload.trans_id);
            format!("c2b_{}", payload.trans_id)
        },
    };
    let event = payload.into_callback_event(gateway_reference, raw);
    let outcome = api.apply(event).await?;
    Ok(acknowledge(outcome))
}

/// `POST /gateway/validation` — the pre-authorization question. Decided from the configured bounds and shortcode
/// alone; no transaction lookup happens here.
pub async fn gateway_validation(
    body: web::Json<serde_json::Value>,
    limits: web::Data<GatewayLimits>,
) -> Result<HttpResponse, ServerError> {
    let raw = body.into_inner();
    let payload: C2bPayload = serde_json::from_value(raw).map_err(|e| {
        warn!("📥️ Malformed validation callback: {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let decision = match payload.amount() {
        Some(amount) => match decide_validation(amount, &payload.business_short_code, limits.as_ref()) {
            mobile_payment_engine::ValidationDecision::Accept => GatewayDecision::accept(),
            mobile_payment_engine::ValidationDecision::Reject(reason) => GatewayDecision::reject(reason),
        },
        None => GatewayDecision::reject(format!("Unparseable amount: {}", payload.trans_amount)),
    };
    debug!("🛂️ Validation decision for {}: {}", payload.trans_id, decision.result_code);
    Ok(HttpResponse::Ok().json(decision))
}

/// `POST /gateway/timeout` — the gateway gave up on the push before the payer answered.
pub async fn gateway_timeout<B: PaymentStore>(
    body: web::Json<serde_json::Value>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let raw = body.into_inner();
    let notice: TimeoutNotice = serde_json::from_value(raw.clone()).map_err(|e| {
        warn!("📥️ Malformed timeout notice: {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let event = notice.into_callback_event(raw);
    let outcome = api.apply(event).await?;
    Ok(acknowledge(outcome))
}

fn acknowledge(outcome: ApplyOutcome) -> HttpResponse {
    let message = match outcome {
        ApplyOutcome::Reconciled(transaction) => {
            format!("Callback applied. Transaction #{} is {}.", transaction.id, transaction.status)
        },
        ApplyOutcome::AlreadyReconciled => "Callback already applied.".to_string(),
        ApplyOutcome::Orphan => "Callback recorded.".to_string(),
    };
    HttpResponse::Ok().json(JsonResponse::success(message))
}
