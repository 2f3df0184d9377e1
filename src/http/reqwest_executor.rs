use std::time::Duration;

use reqwest::Identity;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use crate::http::{Headers, HttpExecutor, Method, OptionValue, Request, Response};
use crate::utils::error::HttpError;

pub const OPTION_TIMEOUT: &str = "timeout";
pub const OPTION_TRUSTED_CERTS: &str = "TrustedCerts";
pub const OPTION_PROXY: &str = "proxy";
/// PEM client certificate for x509 authentication.
pub const OPTION_X509_CERTIFICATE: &str = "x509certificate";
/// PEM private key matching [`OPTION_X509_CERTIFICATE`].
pub const OPTION_X509_PRIVATE_KEY: &str = "x509privatekey";

/// Options the engine is rebuilt from whenever one of them changes.
#[derive(Debug, Clone, Default)]
struct EngineOptions {
    timeout: Option<Duration>,
    trusted_certs: Option<String>,
    proxy: Option<String>,
    x509_certificate: Option<String>,
    x509_private_key: Option<String>,
}

impl EngineOptions {
    /// The client identity, once both halves of it are known.
    fn identity(&self) -> Option<reqwest::Result<Identity>> {
        let (Some(cert), Some(key)) = (&self.x509_certificate, &self.x509_private_key) else {
            return None;
        };
        let pem = format!("{}\n{}", cert.trim_end(), key.trim_end());
        Some(Identity::from_pem(pem.as_bytes()))
    }
}

/// Converts response headers, dropping the ones whose value is not visible
/// ASCII. Returns the names of the dropped headers.
pub(crate) fn convert_headers(map: &HeaderMap) -> (Headers, Vec<String>) {
    let mut headers = Headers::new();
    let mut dropped = Vec::new();
    for (name, value) in map {
        let converted = value
            .to_str()
            .ok()
            .and_then(|value| headers.replace(name.as_str(), value).ok());
        if converted.is_none() {
            if name.as_str().starts_with("iothub-") {
                warn!("dropping unreadable response header {}", name);
            } else {
                debug!("dropping unreadable response header {}", name);
            }
            dropped.push(name.as_str().to_string());
        }
    }
    (headers, dropped)
}

/// [`HttpExecutor`] backed by a blocking `reqwest` client over HTTPS.
///
/// The client is built on first use and rebuilt after an option change, so
/// connections are kept alive across ticks.
#[derive(Debug)]
pub struct ReqwestExecutor {
    host: String,
    options: EngineOptions,
    client: Option<Client>,
}

impl ReqwestExecutor {
    /// An engine for `https://{host}`; the client itself is built lazily.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            options: EngineOptions::default(),
            client: None,
        }
    }

    /// Host every request is sent to.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn build_client(&self) -> Result<Client, HttpError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(pem) = &self.options.trusted_certs {
            let certs = reqwest::Certificate::from_pem_bundle(pem.as_bytes())
                .map_err(|e| HttpError::Builder(format!("invalid trusted certificates: {e}")))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if let Some(proxy) = &self.options.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| HttpError::Builder(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        if let Some(identity) = self.options.identity() {
            let identity =
                identity.map_err(|e| HttpError::Builder(format!("invalid x509 identity: {e}")))?;
            builder = builder.identity(identity);
        }
        builder
            .build()
            .map_err(|e| HttpError::Builder(e.to_string()))
    }

    fn client(&mut self) -> Result<&Client, HttpError> {
        if self.client.is_none() {
            self.client = Some(self.build_client()?);
        }
        self.client
            .as_ref()
            .ok_or_else(|| HttpError::Builder("client unavailable".into()))
    }
}

/// Keeps `options` only if the identity they describe, if complete, parses.
fn checked_identity(options: EngineOptions) -> Result<EngineOptions, HttpError> {
    match options.identity() {
        Some(Err(e)) => Err(HttpError::InvalidArg(format!("x509 identity: {e}"))),
        _ => Ok(options),
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&mut self, request: &Request<'_>) -> Result<Response, HttpError> {
        let url = format!("https://{}{}", self.host, request.relative_path);
        let client = self.client()?;

        let mut builder = client.request(to_reqwest(request.method), &url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();

        let (headers, dropped_headers) = convert_headers(response.headers());
        let body = response.bytes()?.to_vec();

        debug!("{} {} -> {}", request.method.as_str(), url, status);
        Ok(Response {
            status,
            headers,
            body,
            dropped_headers,
        })
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<(), HttpError> {
        match (name, value) {
            (OPTION_TIMEOUT, OptionValue::UInt(ms)) => {
                self.options.timeout = Some(Duration::from_millis(*ms));
            }
            (OPTION_TRUSTED_CERTS, OptionValue::Str(pem)) => {
                reqwest::Certificate::from_pem_bundle(pem.as_bytes())
                    .map_err(|e| HttpError::InvalidArg(format!("TrustedCerts: {e}")))?;
                self.options.trusted_certs = Some(pem.clone());
            }
            (OPTION_PROXY, OptionValue::Str(url)) => {
                reqwest::Proxy::all(url.as_str())
                    .map_err(|e| HttpError::InvalidArg(format!("proxy: {e}")))?;
                self.options.proxy = Some(url.clone());
            }
            (OPTION_X509_CERTIFICATE, OptionValue::Str(pem)) => {
                let mut options = self.options.clone();
                options.x509_certificate = Some(pem.clone());
                self.options = checked_identity(options)?;
            }
            (OPTION_X509_PRIVATE_KEY, OptionValue::Str(pem)) => {
                let mut options = self.options.clone();
                options.x509_private_key = Some(pem.clone());
                self.options = checked_identity(options)?;
            }
            (
                OPTION_TIMEOUT
                | OPTION_TRUSTED_CERTS
                | OPTION_PROXY
                | OPTION_X509_CERTIFICATE
                | OPTION_X509_PRIVATE_KEY,
                _,
            ) => {
                return Err(HttpError::InvalidArg(format!(
                    "unexpected value type for option {name}"
                )));
            }
            _ => return Err(HttpError::InvalidArg(format!("unknown option {name}"))),
        }
        self.client = None;
        Ok(())
    }
}
