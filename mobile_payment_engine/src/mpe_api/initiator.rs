use std::fmt::Debug;

use chrono::Duration;
use log::*;
use mpg_common::Money;

use crate::{
    db_types::{NewTransaction, OrderId, PaymentTransaction},
    mpe_api::{errors::InitiateError, GatewayLimits},
    traits::{PaymentStore, PushError, PushGateway, PushRequest},
};

/// `StkPushInitiator` starts a payment: it takes the per-order initiation lock, asks the gateway to prompt the
/// payer, and persists the pending transaction that later callbacks will reconcile against.
///
/// Exactly one initiation can be in flight per order. The lock is a database reservation with a TTL, so a crashed
/// initiator cannot block its order forever; and even if the reservation were somehow bypassed, the store's
/// one-`Initiated`-per-order constraint still refuses the second insert.
pub struct StkPushInitiator<B, G> {
    db: B,
    gateway: G,
    limits: GatewayLimits,
    reservation_ttl: Duration,
}

impl<B, G> Debug for StkPushInitiator<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StkPushInitiator")
    }
}

impl<B, G> StkPushInitiator<B, G>
where
    B: PaymentStore,
    G: PushGateway,
{
    pub fn new(db: B, gateway: G, limits: GatewayLimits, reservation_ttl: Duration) -> Self {
        Self { db, gateway, limits, reservation_ttl }
    }

    pub fn limits(&self) -> &GatewayLimits {
        &self.limits
    }

    /// Initiate a push payment for the given order.
    ///
    /// On success the returned transaction is in `Initiated` status and carries the gateway reference that every
    /// later callback will correlate on. On any failure after the reservation was taken, the reservation is
    /// released before the error is returned, so the caller (or anyone else) can retry immediately.
    pub async fn initiate(
        &self,
        order_id: OrderId,
        amount: Money,
        msisdn: String,
    ) -> Result<PaymentTransaction, InitiateError> {
        if amount < self.limits.min_amount || amount > self.limits.max_amount {
            info!("💳️ Refusing to initiate payment of {amount} for order {order_id}: out of range");
            return Err(InitiateError::AmountOutOfRange {
                amount,
                min: self.limits.min_amount,
                max: self.limits.max_amount,
            });
        }
        let acquired = self.db.acquire_initiation_reservation(&order_id, self.reservation_ttl).await?;
        if !acquired {
            info!("💳️ Order {order_id} already has an initiation in flight. Refusing to start another.");
            return Err(InitiateError::DuplicateInitiation(order_id));
        }
        // The reservation is held from here on. Every early return below must release it first.
        if self.db.has_initiated_transaction(&order_id).await? {
            self.release_reservation(&order_id).await;
            info!("💳️ Order {order_id} is still awaiting a callback for an earlier push. Refusing to re-initiate.");
            return Err(InitiateError::DuplicateInitiation(order_id));
        }
        self.db.upsert_order(&order_id, amount).await?;
        let request = PushRequest { order_id: order_id.clone(), amount, msisdn };
        let ack = match self.gateway.push(&request).await {
            Ok(ack) => ack,
            Err(e) => {
                self.release_reservation(&order_id).await;
                warn!("💳️ Push for order {order_id} did not go out: {e}");
                return Err(match e {
                    PushError::Unavailable(reason) => InitiateError::GatewayUnavailable(reason),
                    PushError::Rejected(reason) => InitiateError::GatewayRejected(reason),
                });
            },
        };
        debug!("💳️ Gateway accepted push for order {order_id}. Reference: {}", ack.gateway_reference);
        let new_transaction = NewTransaction::new(order_id.clone(), ack.gateway_reference, amount);
        let transaction = match self.db.insert_transaction(new_transaction).await {
            Ok(t) => t,
            Err(e) => {
                self.release_reservation(&order_id).await;
                return Err(e.into());
            },
        };
        self.release_reservation(&order_id).await;
        info!(
            "💳️ Payment initiated for order {order_id}: transaction #{} (attempt {}), awaiting callback",
            transaction.id, transaction.attempt_count
        );
        Ok(transaction)
    }

    /// Best effort. The reservation has a TTL, so a failed release only delays the next initiation; the caller's
    /// original outcome is the one worth surfacing.
    async fn release_reservation(&self, order_id: &OrderId) {
        if let Err(e) = self.db.release_initiation_reservation(order_id).await {
            warn!("💳️ Could not release the initiation reservation for order {order_id}: {e}. The TTL will clear it.");
        }
    }
}
