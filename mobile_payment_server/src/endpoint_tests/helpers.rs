use chrono::Duration;
use mobile_payment_engine::{
    db_types::{OrderId, PaymentTransaction},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{PushAcknowledgement, PushError, PushGateway, PushRequest},
    GatewayLimits,
    SqliteDatabase,
    StkPushInitiator,
};
use mpg_common::Money;

/// A gateway that always accepts and hands out a predictable reference.
#[derive(Clone)]
pub struct TestGateway;

impl PushGateway for TestGateway {
    async fn push(&self, request: &PushRequest) -> Result<PushAcknowledgement, PushError> {
        Ok(PushAcknowledgement {
            gateway_reference: format!("ws_CO_test_{}", request.order_id.as_str()),
            description: "Success. Request accepted for processing".to_string(),
        })
    }
}

pub fn test_limits() -> GatewayLimits {
    GatewayLimits {
        min_amount: Money::from_shillings(1),
        max_amount: Money::from_shillings(150_000),
        shortcode: "174379".to_string(),
    }
}

pub async fn new_test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn test_initiator(db: SqliteDatabase) -> StkPushInitiator<SqliteDatabase, TestGateway> {
    StkPushInitiator::new(db, TestGateway, test_limits(), Duration::seconds(30))
}

/// Seed an order with an `Initiated` transaction and return it.
pub async fn seed_initiated_payment(db: &SqliteDatabase, order_id: &str, amount: Money) -> PaymentTransaction {
    test_initiator(db.clone())
        .initiate(OrderId::from(order_id.to_string()), amount, "254708374149".to_string())
        .await
        .expect("Error seeding initiated payment")
}
