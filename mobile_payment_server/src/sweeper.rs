use chrono::Duration;
use log::*;
use mobile_payment_engine::{events::EventProducers, ReconciliationApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the timeout sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every tick, transactions that have sat in `Initiated` for longer than `pending_timeout` are settled as
/// `TimedOut`. The sweep is a single conditional statement, so a second server instance running its own sweeper
/// is harmless.
pub fn start_sweeper_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    pending_timeout: Duration,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = ReconciliationApi::new(db, producers);
        info!("🕰️ Payment timeout sweeper started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment timeout sweep");
            match api.sweep_stale(pending_timeout).await {
                Ok(swept) if swept.is_empty() => {},
                Ok(swept) => {
                    info!("🕰️ {} payment(s) timed out", swept.len());
                    debug!("🕰️ Timed out transactions: {}", transaction_list(&swept));
                },
                Err(e) => {
                    error!("🕰️ Error running payment timeout sweep: {e}");
                },
            }
        }
    })
}

fn transaction_list(transactions: &[mobile_payment_engine::db_types::PaymentTransaction]) -> String {
    transactions
        .iter()
        .map(|t| format!("[{}] order_id: {} amount: {}", t.id, t.order_id, t.amount))
        .collect::<Vec<String>>()
        .join(", ")
}
