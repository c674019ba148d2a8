//! Simple stateless pub-sub event handler
//!
//! The reconciliation engine must stay decoupled from event delivery mechanics, so outbound domain events go
//! through this small channel: producers publish fire-and-forget, a single handler task consumes. Handlers are
//! async and receive only the event itself, never engine state.
use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI64, Arc},
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then drains outstanding handler tasks.
    pub async fn start_handler(mut self) {
        debug!("📨️ Starting event handler");
        // Drop the internal sender so that closing the last producer shuts the handler down.
        drop(self.sender);
        let in_flight = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            let handler = Arc::clone(&self.handler);
            in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let counter = in_flight.clone();
            tokio::spawn(async move {
                (handler)(ev).await;
                counter.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
            });
        }
        while in_flight.load(std::sync::atomic::Ordering::SeqCst) > 0 {
            debug!("📨️ Waiting for event handler jobs to complete");
            tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
        }
        debug!("📨️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Fire-and-forget. A full or closed channel is logged and swallowed; event delivery must never fail a
    /// reconciliation that has already committed.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📨️ Failed to publish event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicU64;

    use super::*;

    #[tokio::test]
    async fn events_from_all_producers_reach_the_handler() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let t2 = total.clone();
        let handler = Arc::new(move |v: u64| {
            let total = total.clone();
            Box::pin(async move {
                total.fetch_add(v, std::sync::atomic::Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(4, handler);
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_1.publish_event(i * 2 + 1).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_2.publish_event(i * 2).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(t2.load(std::sync::atomic::Ordering::SeqCst), 45);
    }
}
