//! The `client` module is the device-facing surface of the crate.
//!
//! [`DeviceClient`] owns the send queue and the user callbacks, and lends
//! both to its [`HttpTransport`](crate::transport::HttpTransport) on every
//! [`do_work`](DeviceClient::do_work) tick.

pub mod device_client;
pub use device_client::{ConfirmationCallback, DeviceClient, MessageCallback};
