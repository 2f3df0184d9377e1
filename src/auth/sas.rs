//! Shared-access-signature authorization.
//!
//! A [`SasContext`] owns the decoded signing key and the resource URI of one
//! device. Every request goes through [`SasContext::execute`], which puts a
//! freshly signed token into the `Authorization` header of a per-call copy of
//! the request headers.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::http::{HttpExecutor, Request, Response};
use crate::utils::clock::Clock;
use crate::utils::error::{HttpError, Result, TransportError};
use crate::utils::url;

type HmacSha256 = Hmac<Sha256>;

pub const AUTHORIZATION: &str = "Authorization";

/// Lifetime of a generated token, in seconds.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Clone)]
pub struct SasContext {
    mac: HmacSha256,
    uri_resource: String,
    key_name: String,
}

impl std::fmt::Debug for SasContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasContext")
            .field("key", &"<redacted>")
            .field("uri_resource", &self.uri_resource)
            .field("key_name", &self.key_name)
            .finish()
    }
}

impl SasContext {
    /// `key` is the base64 shared access key; `key_name` is empty for
    /// device-scoped keys.
    pub fn new(key: &str, uri_resource: impl Into<String>, key_name: impl Into<String>) -> Result<Self> {
        let key = general_purpose::STANDARD.decode(key)?;
        let mac = <HmacSha256 as Mac>::new_from_slice(&key)
            .map_err(|_| TransportError::InvalidArg("device key"))?;
        Ok(Self {
            mac,
            uri_resource: uri_resource.into(),
            key_name: key_name.into(),
        })
    }

    /// The resource URI tokens are scoped to.
    pub fn uri_resource(&self) -> &str {
        &self.uri_resource
    }

    /// Builds the token expiring at `expiry` (seconds since the epoch).
    pub fn token(&self, expiry: i64) -> String {
        let to_sign = format!("{}\n{}", self.uri_resource, expiry);
        let mut mac = self.mac.clone();
        mac.update(to_sign.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        let mut token = format!(
            "SharedAccessSignature sr={}&sig={}&se={}",
            self.uri_resource,
            url::encode(&signature),
            expiry
        );
        if !self.key_name.is_empty() {
            token.push_str("&skn=");
            token.push_str(&self.key_name);
        }
        token
    }

    /// Executes `request`, signing it first when it carries an
    /// `Authorization` header and the clock knows the time.
    ///
    /// Otherwise the request goes out unchanged.
    pub fn execute<E, C>(&self, executor: &mut E, clock: &C, request: &Request<'_>) -> Result<Response, HttpError>
    where
        E: HttpExecutor + ?Sized,
        C: Clock + ?Sized,
    {
        if request.headers.find(AUTHORIZATION).is_none() {
            return executor.execute(request);
        }
        let Some(now) = clock.now() else {
            return executor.execute(request);
        };

        let token = self.token(now + TOKEN_LIFETIME_SECS);
        let mut headers = request.headers.clone();
        if let Err(e) = headers.replace(AUTHORIZATION, &token) {
            warn!("unable to place SAS token, sending unsigned: {}", e);
            return executor.execute(request);
        }
        executor.execute(&Request {
            headers: &headers,
            ..*request
        })
    }
}
