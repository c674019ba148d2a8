//! # Mobile payment gateway server
//! This crate hosts the HTTP surface for the mobile payment gateway. It is responsible for:
//! * Accepting payment initiation requests and handing them to the push initiator.
//! * Listening for the gateway's asynchronous callbacks and forwarding them to the reconciliation engine.
//! * Running the timeout sweeper that settles payments whose callback never arrives.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: a health check route that returns a 200 OK response.
//! * `POST /payments`: initiate a push payment for an order.
//! * `GET /payments/{order_id}`: the current transaction record for an order.
//! * `POST /gateway/{result,confirmation,validation,timeout}`: the gateway callback endpoints.

pub mod callback_payloads;
pub mod callback_routes;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweeper;

#[cfg(test)]
mod endpoint_tests;
