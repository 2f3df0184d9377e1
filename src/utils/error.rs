//! The `error` module defines the error types used within `iothub-http`.
//!
//! Two layers are distinguished:
//!
//! - [`HttpError`] is what an [`HttpExecutor`](crate::http::HttpExecutor)
//!   reports when a request could not be carried out or an option was refused.
//! - [`TransportError`] is what the transport surface returns to its owner.
//!
//! Errors raised while a tick is running are logged and swallowed by the
//! transport; only creation and option calls hand a `TransportError` back.

use thiserror::Error;

/// Failure reported by an HTTP execution engine.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The engine refused an argument (unknown option name, bad value...).
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The request was attempted but did not complete.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine could not be (re)built from its current options.
    #[error("unable to build http client: {0}")]
    Builder(String),
}

/// Failure reported by the transport to its owner.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A required argument was missing, empty or of the wrong type.
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),

    /// The device key is not valid base64.
    #[error("device key is not valid base64: {0}")]
    Key(#[from] base64::DecodeError),

    /// A header name or value cannot be put on the wire.
    #[error("invalid header {name:?}: {reason}")]
    Header { name: String, reason: &'static str },

    /// The underlying HTTP engine failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A pass-through option was refused by the HTTP engine.
    #[error("unable to set option {name:?}: {source}")]
    Option {
        name: String,
        #[source]
        source: HttpError,
    },

    /// A message body could not be serialized.
    #[error("unable to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T, E = TransportError> = std::result::Result<T, E>;
