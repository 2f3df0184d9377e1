//! The `config` module loads the device process settings.
//!
//! Values come from `config/default.{toml,yaml,json}` (optional) and from
//! `IOTHUB_`-prefixed environment variables, with `__` between levels
//! (`IOTHUB_DEVICE__ID`, `IOTHUB_TRANSPORT__BATCHING`...). Anything left
//! unset falls back to [`Settings::default`].

mod settings;

use std::fs;
use std::io;

use config::{Config, ConfigError, Environment, File};

use crate::http::OptionValue;
use crate::http::reqwest_executor::{
    OPTION_TIMEOUT, OPTION_X509_CERTIFICATE, OPTION_X509_PRIVATE_KEY,
};
use crate::transport::{OPTION_BATCHING, OPTION_MINIMUM_POLLING_TIME, TransportConfig};
use settings::PartialSettings;

pub use settings::{DeviceSettings, HubSettings, LoggingSettings, Settings, TransportSettings};

pub const ENV_PREFIX: &str = "IOTHUB";

/// Loads the configuration from the default file and environment variables,
/// merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge(Settings::default()))
}

impl TransportConfig {
    /// The device is taken as x509 when a certificate file is configured.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            iot_hub_name: settings.hub.name.clone(),
            iot_hub_suffix: settings.hub.suffix.clone(),
            protocol_gateway_host_name: settings.hub.gateway_host_name.clone(),
            device_id: settings.device.id.clone(),
            device_key: settings.device.key.clone(),
            device_sas_token: settings.device.sas_token.clone(),
            x509: settings.device.x509_certificate_file.is_some(),
        }
    }
}

impl Settings {
    /// Runtime options to apply to a freshly created transport, in order.
    pub fn transport_options(&self) -> Vec<(&'static str, OptionValue)> {
        vec![
            (OPTION_BATCHING, OptionValue::Bool(self.transport.batching)),
            (
                OPTION_MINIMUM_POLLING_TIME,
                OptionValue::UInt(self.transport.minimum_polling_secs),
            ),
            (
                OPTION_TIMEOUT,
                OptionValue::UInt(self.transport.request_timeout_ms),
            ),
        ]
    }

    /// Reads the configured x509 PEM files into engine options.
    ///
    /// Empty when no certificate is configured. A certificate without a
    /// private key is an error.
    pub fn x509_options(&self) -> io::Result<Vec<(&'static str, OptionValue)>> {
        let device = &self.device;
        let Some(cert_file) = &device.x509_certificate_file else {
            return Ok(Vec::new());
        };
        let key_file = device.x509_private_key_file.as_ref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "x509 certificate configured without a private key",
            )
        })?;
        Ok(vec![
            (
                OPTION_X509_CERTIFICATE,
                OptionValue::Str(fs::read_to_string(cert_file)?),
            ),
            (
                OPTION_X509_PRIVATE_KEY,
                OptionValue::Str(fs::read_to_string(key_file)?),
            ),
        ])
    }
}
