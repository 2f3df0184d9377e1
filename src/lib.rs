//! # iothub-http
//!
//! `iothub-http` is a device-side HTTP transport for an IoT hub. It sends
//! device-to-cloud events (batched or one by one), polls for cloud-to-device
//! messages and settles them, and signs every request with a SAS token.
//!
//! ## Core Modules
//!
//! - `auth`: device credentials and SAS token signing.
//! - `client`: `DeviceClient`, owner of the send queue and the callbacks.
//! - `config`: loading device settings from files and the environment.
//! - `http`: the request model and the executor trait, plus a `reqwest` engine.
//! - `message`: outgoing and inbound messages and the send queue.
//! - `transport`: the HTTP transport driven by `do_work` ticks.
//! - `utils`: errors, logging, URL encoding and the clock.

pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod message;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use client::DeviceClient;
pub use transport::{HttpTransport, TransportConfig};
