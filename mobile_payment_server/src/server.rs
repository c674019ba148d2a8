use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use daraja_tools::DarajaApi;
use log::*;
use mobile_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    traits::PushGateway,
    ReconciliationApi,
    SqliteDatabase,
    StkPushInitiator,
};

use crate::{
    callback_routes::{gateway_confirmation, gateway_result, gateway_timeout, gateway_validation},
    config::ServerConfig,
    errors::ServerError,
    integrations::daraja::DarajaGateway,
    middleware::{HmacMiddlewareFactory, HMAC_HEADER},
    routes::{health, initiate_payment, payment_status},
    sweeper::start_sweeper_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(100, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    start_sweeper_worker(db.clone(), producers.clone(), config.pending_payment_timeout, config.sweep_interval);
    let api = DarajaApi::new(config.daraja.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = DarajaGateway::new(api);
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The default event sink: every payment outcome is logged, whether or not anything else subscribes.
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_payment_completed(|event| {
        Box::pin(async move {
            info!("📨️ Payment completed for order {}: {} (transaction #{})", event.order_id, event.amount, event.transaction_id);
        })
    });
    hooks.on_payment_failed(|event| {
        Box::pin(async move {
            info!("📨️ Payment failed for order {}: {} (transaction #{})", event.order_id, event.reason, event.transaction_id);
        })
    });
    hooks.on_payment_timed_out(|event| {
        Box::pin(async move {
            info!("📨️ Payment timed out for order {} (transaction #{})", event.order_id, event.transaction_id);
        })
    });
    hooks
}

pub fn create_server_instance<G>(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: G,
    producers: EventProducers,
) -> Result<Server, ServerError>
where
    G: PushGateway + Send + 'static,
{
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let limits = config.gateway_limits();
        let initiator =
            StkPushInitiator::new(db.clone(), gateway.clone(), limits.clone(), config.initiation_lock_ttl);
        let reconciliation = ReconciliationApi::new(db.clone(), producers.clone());
        let hmac = HmacMiddlewareFactory::new(
            HMAC_HEADER,
            config.callback_auth.hmac_secret.clone(),
            config.callback_auth.hmac_checks,
        );
        let gateway_scope = web::scope("/gateway")
            .wrap(hmac)
            .route("/result", web::post().to(gateway_result::<SqliteDatabase>))
            .route("/confirmation", web::post().to(gateway_confirmation::<SqliteDatabase>))
            .route("/validation", web::post().to(gateway_validation))
            .route("/timeout", web::post().to(gateway_timeout::<SqliteDatabase>));
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mpg::access_log"))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(initiator))
            .app_data(web::Data::new(reconciliation))
            .app_data(web::Data::new(limits))
            .service(health)
            .route("/payments", web::post().to(initiate_payment::<SqliteDatabase, G>))
            .route("/payments/{order_id}", web::get().to(payment_status::<SqliteDatabase>))
            .service(gateway_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
