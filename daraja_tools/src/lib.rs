mod api;
mod config;
mod error;
mod helpers;

mod data_objects;

pub use api::DarajaApi;
pub use config::{CallbackUrls, DarajaConfig, Environment};
pub use data_objects::{AccessTokenResponse, PushAck, StkPushRequest, StkPushResponse};
pub use error::DarajaApiError;
pub use helpers::{daraja_password, daraja_timestamp};
