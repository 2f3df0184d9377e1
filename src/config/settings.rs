use serde::Deserialize;

/// Top-level configuration of the device process.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub hub: HubSettings,
    pub device: DeviceSettings,
    pub transport: TransportSettings,
    pub logging: LoggingSettings,
}

/// Where the hub lives.
///
/// `gateway_host_name`, when set, replaces `name.suffix` as the host.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HubSettings {
    pub name: String,
    pub suffix: String,
    pub gateway_host_name: Option<String>,
}

/// Identity of the device.
///
/// Exactly one credential is expected: `key`, `sas_token`, or the pair of
/// x509 PEM files.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub id: String,
    pub key: Option<String>,
    pub sas_token: Option<String>,
    pub x509_certificate_file: Option<String>,
    pub x509_private_key_file: Option<String>,
}

impl std::fmt::Debug for DeviceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSettings")
            .field("id", &self.id)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .field("x509_certificate_file", &self.x509_certificate_file)
            .field("x509_private_key_file", &self.x509_private_key_file)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub batching: bool,
    pub minimum_polling_secs: u64,
    pub request_timeout_ms: u64,
    /// How often the binary calls `do_work`.
    pub tick_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled in from [`Settings::default`].
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub hub: Option<PartialHubSettings>,
    pub device: Option<PartialDeviceSettings>,
    pub transport: Option<PartialTransportSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialHubSettings {
    pub name: Option<String>,
    pub suffix: Option<String>,
    pub gateway_host_name: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct PartialDeviceSettings {
    pub id: Option<String>,
    pub key: Option<String>,
    pub sas_token: Option<String>,
    pub x509_certificate_file: Option<String>,
    pub x509_private_key_file: Option<String>,
}

impl std::fmt::Debug for PartialDeviceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialDeviceSettings")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialTransportSettings {
    pub batching: Option<bool>,
    pub minimum_polling_secs: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub tick_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hub: HubSettings {
                name: String::new(),
                suffix: "azure-devices.net".to_string(),
                gateway_host_name: None,
            },
            device: DeviceSettings {
                id: String::new(),
                key: None,
                sas_token: None,
                x509_certificate_file: None,
                x509_private_key_file: None,
            },
            transport: TransportSettings {
                batching: true,
                minimum_polling_secs: 1500,
                request_timeout_ms: 30_000,
                tick_interval_ms: 1_000,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let hub = self.hub.unwrap_or_default();
        let device = self.device.unwrap_or_default();
        let transport = self.transport.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            hub: HubSettings {
                name: hub.name.unwrap_or(default.hub.name),
                suffix: hub.suffix.unwrap_or(default.hub.suffix),
                gateway_host_name: hub.gateway_host_name.or(default.hub.gateway_host_name),
            },
            device: DeviceSettings {
                id: device.id.unwrap_or(default.device.id),
                key: device.key.or(default.device.key),
                sas_token: device.sas_token.or(default.device.sas_token),
                x509_certificate_file: device
                    .x509_certificate_file
                    .or(default.device.x509_certificate_file),
                x509_private_key_file: device
                    .x509_private_key_file
                    .or(default.device.x509_private_key_file),
            },
            transport: TransportSettings {
                batching: transport.batching.unwrap_or(default.transport.batching),
                minimum_polling_secs: transport
                    .minimum_polling_secs
                    .unwrap_or(default.transport.minimum_polling_secs),
                request_timeout_ms: transport
                    .request_timeout_ms
                    .unwrap_or(default.transport.request_timeout_ms),
                tick_interval_ms: transport
                    .tick_interval_ms
                    .unwrap_or(default.transport.tick_interval_ms),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
            },
        }
    }
}
