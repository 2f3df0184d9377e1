//! The `auth` module authorizes requests made on behalf of a device.
//!
//! Devices authenticate with a shared access key, from which a
//! [`sas::SasContext`] signs every request, or with a SAS token supplied
//! ready-made by the owner. An x509 device carries no `Authorization` header
//! at all; its client certificate is configured on the HTTP engine.

pub mod sas;

pub use sas::SasContext;

/// How a device proves its identity to the hub.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Base64 shared access key; tokens are generated per request.
    DeviceKey(String),
    /// Pre-built `SharedAccessSignature ...` token, sent as-is.
    SasToken(String),
    /// Client certificate held by the HTTP engine.
    X509,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::DeviceKey(_) => f.write_str("DeviceKey(<redacted>)"),
            Credential::SasToken(_) => f.write_str("SasToken(<redacted>)"),
            Credential::X509 => f.write_str("X509"),
        }
    }
}
