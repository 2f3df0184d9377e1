use crate::utils::url;

/// Query suffix appended to every REST path.
pub const API_VERSION: &str = "?api-version=2015-08-15-preview";

pub const EVENT_ENDPOINT: &str = "/messages/events";
pub const MESSAGE_ENDPOINT: &str = "/messages/devicebound";
pub const MESSAGE_ENDPOINT_ETAG: &str = "/messages/devicebound/";

/// Marker appended after the version suffix to reject a message.
pub const REJECT_MARKER: &str = "&reject";

/// Relative REST paths of one device, computed once from its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    event: String,
    message: String,
    abandon_prefix: String,
    iothub_to: String,
}

impl DevicePaths {
    /// Builds every path for `device_id`, URL-encoding it once.
    pub fn new(device_id: &str) -> Self {
        let device = format!("/devices/{}", url::encode(device_id));
        Self {
            event: format!("{device}{EVENT_ENDPOINT}{API_VERSION}"),
            message: format!("{device}{MESSAGE_ENDPOINT}{API_VERSION}"),
            abandon_prefix: format!("{device}{MESSAGE_ENDPOINT_ETAG}"),
            iothub_to: format!("{device}{EVENT_ENDPOINT}"),
        }
    }

    /// `POST` target for events.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// `GET` target for cloud-to-device polls.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Common start of every disposition path; the ETag follows it.
    pub fn abandon_prefix(&self) -> &str {
        &self.abandon_prefix
    }

    /// Value of the `iothub-to` event header.
    pub fn iothub_to(&self) -> &str {
        &self.iothub_to
    }

    /// `DELETE` target completing the message identified by `etag`.
    pub fn accept(&self, etag: &str) -> String {
        format!("{}{etag}{API_VERSION}", self.abandon_prefix)
    }

    /// `DELETE` target dead-lettering the message identified by `etag`.
    pub fn reject(&self, etag: &str) -> String {
        format!("{}{etag}{API_VERSION}{REJECT_MARKER}", self.abandon_prefix)
    }

    /// `POST` target handing the message identified by `etag` back to the hub.
    pub fn abandon(&self, etag: &str) -> String {
        format!("{}{etag}/abandon{API_VERSION}", self.abandon_prefix)
    }
}

/// `{hub}.{suffix}`, unless a protocol gateway stands in for the hub.
pub fn host_name(iot_hub_name: &str, iot_hub_suffix: &str, gateway: Option<&str>) -> String {
    match gateway {
        Some(gateway) => gateway.to_string(),
        None => format!("{iot_hub_name}.{iot_hub_suffix}"),
    }
}
