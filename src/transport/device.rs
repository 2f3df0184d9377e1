use tracing::debug;

use super::paths::DevicePaths;
use super::{USER_AGENT, USER_AGENT_VALUE};
use crate::auth::Credential;
use crate::auth::sas::{AUTHORIZATION, SasContext};
use crate::http::Headers;
use crate::utils::error::{Result, TransportError};
use crate::utils::url;

/// Identifies a device registered on one transport.
///
/// Handles are never reused, so a stale handle stays unknown after
/// [`unregister`](super::HttpTransport::unregister).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(pub(super) u64);

/// Identity and credential of one device.
///
/// Exactly one credential must be chosen: `device_key`, `device_sas_token`,
/// or `x509` with neither of the other two.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub device_id: String,
    pub device_key: Option<String>,
    pub device_sas_token: Option<String>,
    pub x509: bool,
}

impl DeviceConfig {
    /// Checks the device id and picks the credential.
    pub fn validate(&self) -> Result<Credential> {
        if self.device_id.is_empty() {
            return Err(TransportError::InvalidArg("device id"));
        }
        match (
            self.device_key.as_deref(),
            self.device_sas_token.as_deref(),
            self.x509,
        ) {
            (Some(key), None, false) if !key.is_empty() => {
                Ok(Credential::DeviceKey(key.to_string()))
            }
            (None, Some(token), false) if !token.is_empty() => {
                Ok(Credential::SasToken(token.to_string()))
            }
            (None, None, true) => Ok(Credential::X509),
            (Some(_), Some(_), _) => Err(TransportError::InvalidArg(
                "device key and sas token are mutually exclusive",
            )),
            (Some(_), _, true) | (_, Some(_), true) => Err(TransportError::InvalidArg(
                "x509 excludes a device key or sas token",
            )),
            _ => Err(TransportError::InvalidArg("device key or sas token")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PollState {
    pub(super) is_first_poll: bool,
    pub(super) last_poll_time: i64,
    pub(super) subscribed: bool,
}

/// What a transport keeps about one registered device: its paths, header
/// templates, signer and poll state.
#[derive(Debug)]
pub struct Device {
    handle: DeviceHandle,
    device_id: String,
    x509: bool,
    pub(super) paths: DevicePaths,
    pub(super) event_headers: Headers,
    pub(super) message_headers: Headers,
    pub(super) sas: Option<SasContext>,
    pub(super) poll: PollState,
}

impl Device {
    pub(super) fn new(handle: DeviceHandle, host_name: &str, config: &DeviceConfig) -> Result<Self> {
        let credential = config.validate()?;
        let paths = DevicePaths::new(&config.device_id);

        let (authorization, sas) = match &credential {
            Credential::DeviceKey(key) => {
                let uri = format!("{}/devices/{}", host_name, url::encode(&config.device_id));
                (Some(" "), Some(SasContext::new(key, uri, "")?))
            }
            Credential::SasToken(token) => (Some(token.as_str()), None),
            Credential::X509 => (None, None),
        };

        let mut event_headers = Headers::new().with("iothub-to", paths.iothub_to())?;
        if let Some(authorization) = authorization {
            event_headers.replace(AUTHORIZATION, authorization)?;
        }
        let event_headers = event_headers
            .with("Accept", "application/json")?
            .with("Connection", "Keep-Alive")?
            .with(USER_AGENT, USER_AGENT_VALUE)?;

        let mut message_headers = Headers::new().with(USER_AGENT, USER_AGENT_VALUE)?;
        if let Some(authorization) = authorization {
            message_headers.replace(AUTHORIZATION, authorization)?;
        }

        debug!(device = %config.device_id, ?credential, "device registered");
        Ok(Self {
            handle,
            device_id: config.device_id.clone(),
            x509: matches!(credential, Credential::X509),
            paths,
            event_headers,
            message_headers,
            sas,
            poll: PollState {
                is_first_poll: true,
                last_poll_time: 0,
                subscribed: false,
            },
        })
    }

    /// Handle given out by `register`.
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Id as configured, before URL encoding.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Relative REST paths of this device.
    pub fn paths(&self) -> &DevicePaths {
        &self.paths
    }

    /// Whether requests rely on the engine's client certificate.
    pub fn is_x509(&self) -> bool {
        self.x509
    }

    /// Whether ticks poll for this device's cloud-to-device messages.
    pub fn is_subscribed(&self) -> bool {
        self.poll.subscribed
    }
}
