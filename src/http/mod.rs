//! The `http` module is the narrow interface between the transport and the
//! HTTP engine that actually talks to the hub.
//!
//! The transport builds [`Request`]s out of an ordered [`Headers`] set and a
//! relative path, and hands them to an [`HttpExecutor`]. One executor is
//! bound to one host for its whole life. [`ReqwestExecutor`] is the
//! production engine; tests substitute a scripted fake.

pub mod headers;
pub mod reqwest_executor;

pub use headers::Headers;
pub use reqwest_executor::ReqwestExecutor;

use crate::utils::error::HttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    /// The method name as written on the request line.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// One request against the executor's host.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: Method,
    pub relative_path: &'a str,
    pub headers: &'a Headers,
    pub body: Option<&'a [u8]>,
}

/// A completed HTTP dialogue. Any status code counts as completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Names of response headers the engine could not represent.
    pub dropped_headers: Vec<String>,
}

impl Response {
    /// A response with `status`, no headers and an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// Value of a runtime option, for the transport or the HTTP engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    UInt(u64),
    Str(String),
}

/// Executes requests against a single host.
pub trait HttpExecutor {
    /// Sends `request` and waits for the full response.
    ///
    /// `Err` means no HTTP dialogue took place; non-2xx answers are `Ok`.
    fn execute(&mut self, request: &Request<'_>) -> Result<Response, HttpError>;

    /// Applies an engine-level option (timeouts, trusted certificates...).
    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<(), HttpError>;
}

impl<E: HttpExecutor + ?Sized> HttpExecutor for Box<E> {
    fn execute(&mut self, request: &Request<'_>) -> Result<Response, HttpError> {
        (**self).execute(request)
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<(), HttpError> {
        (**self).set_option(name, value)
    }
}
