//! Request handler definitions for the merchant-facing routes.
//!
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//! The gateway callback handlers live in [`crate::callback_routes`].

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use mobile_payment_engine::{
    db_types::OrderId,
    traits::{PaymentStore, PushGateway},
    StkPushInitiator,
};

use crate::{data_objects::InitiatePaymentRequest, errors::ServerError};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Payments  --------------------------------------------------

/// `POST /payments` — initiate a push payment for an order. The payer receives a prompt on their device; the
/// outcome arrives later via the gateway callbacks.
pub async fn initiate_payment<B, G>(
    body: web::Json<InitiatePaymentRequest>,
    api: web::Data<StkPushInitiator<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: PushGateway,
{
    let request = body.into_inner();
    let order_id = OrderId::from(request.order_id.clone());
    debug!("💻️ POST initiate payment of KSh {} for order {order_id}", request.amount);
    let transaction = api.initiate(order_id, request.amount(), request.msisdn).await?;
    Ok(HttpResponse::Ok().json(transaction))
}

/// `GET /payments/{order_id}` — the most recent transaction record for an order. Operator support tooling.
pub async fn payment_status<B: PaymentStore>(
    path: web::Path<String>,
    db: web::Data<B>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ GET payment status for order {order_id}");
    let transaction = db
        .fetch_transaction_for_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No payment transaction for order {order_id}")))?;
    Ok(HttpResponse::Ok().json(transaction))
}
