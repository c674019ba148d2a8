use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    PaymentCompletedEvent,
    PaymentFailedEvent,
    PaymentTimedOutEvent,
};

/// The producer ends of the event channels, injected into the reconciliation engine at construction.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_completed_producer: Vec<EventProducer<PaymentCompletedEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
    pub payment_timed_out_producer: Vec<EventProducer<PaymentTimedOutEvent>>,
}

pub struct EventHandlers {
    pub on_payment_completed: Option<EventHandler<PaymentCompletedEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_payment_timed_out: Option<EventHandler<PaymentTimedOutEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_completed = hooks.on_payment_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_failed = hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_timed_out = hooks.on_payment_timed_out.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_completed, on_payment_failed, on_payment_timed_out }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_completed {
            result.payment_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_timed_out {
            result.payment_timed_out_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_timed_out {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_completed: Option<Handler<PaymentCompletedEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_payment_timed_out: Option<Handler<PaymentTimedOutEvent>>,
}

impl EventHooks {
    pub fn on_payment_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_completed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_timed_out<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentTimedOutEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_timed_out = Some(Arc::new(f));
        self
    }
}
