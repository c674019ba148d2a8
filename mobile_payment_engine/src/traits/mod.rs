mod payment_store;
mod push_gateway;

pub use payment_store::{PaymentStore, PaymentStoreError};
pub use push_gateway::{PushAcknowledgement, PushError, PushGateway, PushRequest};
