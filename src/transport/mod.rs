//! The `transport` module moves messages between a device and its hub over
//! HTTPS.
//!
//! [`HttpTransport`] owns one HTTP engine bound to the hub's host and any
//! number of registered [`Device`]s, each with the paths, header templates,
//! signing context and poll state computed at registration. Ticks are driven
//! by [`HttpTransport::do_work`] (the first registered device) or
//! [`HttpTransport::do_work_all`] (every device, in registration order).
//! For each device a tick does at most one event `POST`, then at most one
//! poll `GET` and the disposition request that follows it.
//!
//! - `device`: per-device configuration and state.
//! - `paths`: relative REST paths and the host name.
//! - `encoder`: batched and single event bodies, size accounting.
//! - `events`: the event send step of a tick.
//! - `messages`: the cloud-to-device poll step of a tick.
//! - `options`: runtime options and their pass-through to the HTTP engine.

mod device;
pub mod encoder;
mod events;
mod messages;
mod options;
pub mod paths;

pub use device::{Device, DeviceConfig, DeviceHandle};
pub use options::{OPTION_BATCHING, OPTION_MINIMUM_POLLING_TIME};

use tracing::{debug, warn};

use crate::auth::Credential;
use crate::auth::sas::SasContext;
use crate::http::{HttpExecutor, ReqwestExecutor, Request, Response};
use crate::message::{
    ConfirmationResult, Disposition, InboundMessage, MessageQueue, OutgoingMessage, SendStatus,
};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::error::{HttpError, Result, TransportError};

/// Poll interval used until `MinimumPollingTime` is set, in seconds.
pub const DEFAULT_MINIMUM_POLLING_TIME: u64 = 25 * 60;

/// Name of the header identifying the client library.
pub const USER_AGENT: &str = "User-Agent";
/// `iothubclient/` followed by the crate version.
pub const USER_AGENT_VALUE: &str = concat!("iothubclient/", env!("CARGO_PKG_VERSION"));

/// Where the hub lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubConfig {
    pub iot_hub_name: String,
    pub iot_hub_suffix: String,
    /// Replaces `name.suffix` as the host when set.
    pub protocol_gateway_host_name: Option<String>,
}

impl HubConfig {
    /// Checks the hub name, the suffix and the gateway host name.
    pub fn validate(&self) -> Result<()> {
        if self.iot_hub_name.is_empty() {
            return Err(TransportError::InvalidArg("iot hub name"));
        }
        if self.iot_hub_suffix.is_empty() {
            return Err(TransportError::InvalidArg("iot hub suffix"));
        }
        if self.protocol_gateway_host_name.as_deref() == Some("") {
            return Err(TransportError::InvalidArg("protocol gateway host name"));
        }
        Ok(())
    }

    /// `name.suffix`, or the gateway host name when set.
    pub fn host_name(&self) -> String {
        paths::host_name(
            &self.iot_hub_name,
            &self.iot_hub_suffix,
            self.protocol_gateway_host_name.as_deref(),
        )
    }
}

/// Everything needed to reach one device's endpoints.
///
/// Exactly one of `device_key`, `device_sas_token` and `x509` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub iot_hub_name: String,
    pub iot_hub_suffix: String,
    pub protocol_gateway_host_name: Option<String>,
    pub device_id: String,
    pub device_key: Option<String>,
    pub device_sas_token: Option<String>,
    pub x509: bool,
}

impl TransportConfig {
    /// Checks every required field and picks the credential.
    pub fn validate(&self) -> Result<Credential> {
        self.hub().validate()?;
        self.device().validate()
    }

    /// The hub half of the configuration.
    pub fn hub(&self) -> HubConfig {
        HubConfig {
            iot_hub_name: self.iot_hub_name.clone(),
            iot_hub_suffix: self.iot_hub_suffix.clone(),
            protocol_gateway_host_name: self.protocol_gateway_host_name.clone(),
        }
    }

    /// The device half of the configuration.
    pub fn device(&self) -> DeviceConfig {
        DeviceConfig {
            device_id: self.device_id.clone(),
            device_key: self.device_key.clone(),
            device_sas_token: self.device_sas_token.clone(),
            x509: self.x509,
        }
    }

    /// Host name of the configured hub.
    pub fn host_name(&self) -> String {
        self.hub().host_name()
    }
}

/// Hooks through which a tick reports back to the owner of the queue.
pub trait TransportCallbacks {
    /// Messages that left the queue for good, with their outcome.
    fn send_complete(&mut self, messages: Vec<OutgoingMessage>, result: ConfirmationResult);

    /// A cloud-to-device message arrived; the answer decides its fate.
    fn message_received(&mut self, message: &InboundMessage) -> Disposition;
}

/// Lends the queue and callbacks of each registered device to
/// [`HttpTransport::do_work_all`].
pub trait DeviceOwners {
    /// The queue and callbacks of `device`; `None` skips it for this tick.
    fn owner(
        &mut self,
        device: DeviceHandle,
    ) -> Option<(&mut MessageQueue, &mut dyn TransportCallbacks)>;
}

/// The engine and the clock shared by every device.
#[derive(Debug)]
struct Connection<E, C> {
    executor: E,
    clock: C,
}

impl<E: HttpExecutor, C: Clock> Connection<E, C> {
    fn execute(&mut self, sas: Option<&SasContext>, request: &Request<'_>) -> Result<Response, HttpError> {
        match sas {
            Some(sas) => sas.execute(&mut self.executor, &self.clock, request),
            None => self.executor.execute(request),
        }
    }
}

/// HTTP transport for the devices of one hub, sharing one engine.
#[derive(Debug)]
pub struct HttpTransport<E = ReqwestExecutor, C = SystemClock> {
    host_name: String,
    connection: Connection<E, C>,
    devices: Vec<Device>,
    next_handle: u64,
    batching: bool,
    minimum_polling_time: u64,
}

impl HttpTransport {
    /// Creates a transport for one device, talking to the real hub through
    /// `reqwest`.
    pub fn create(config: &TransportConfig) -> Result<Self> {
        config.validate()?;
        let executor = ReqwestExecutor::new(config.host_name());
        Self::with_parts(config, executor, SystemClock)
    }

    /// Creates a transport with no device registered yet.
    pub fn for_hub(hub: &HubConfig) -> Result<Self> {
        hub.validate()?;
        let executor = ReqwestExecutor::new(hub.host_name());
        Self::new(hub, executor, SystemClock)
    }
}

impl<E: HttpExecutor, C: Clock> HttpTransport<E, C> {
    /// Creates a transport on top of the given engine and clock, with no
    /// device registered.
    ///
    /// `executor` must already be bound to [`HubConfig::host_name`].
    pub fn new(hub: &HubConfig, executor: E, clock: C) -> Result<Self> {
        hub.validate()?;
        let host_name = hub.host_name();
        debug!(host = %host_name, "transport created");
        Ok(Self {
            host_name,
            connection: Connection { executor, clock },
            devices: Vec::new(),
            next_handle: 0,
            batching: true,
            minimum_polling_time: DEFAULT_MINIMUM_POLLING_TIME,
        })
    }

    /// Creates a transport on top of the given engine and clock and
    /// registers the configured device.
    pub fn with_parts(config: &TransportConfig, executor: E, clock: C) -> Result<Self> {
        let mut transport = Self::new(&config.hub(), executor, clock)?;
        transport.register(&config.device())?;
        Ok(transport)
    }

    /// Adds a device. Device ids are unique within a transport.
    ///
    /// A registered device starts unsubscribed, in "first poll" state.
    pub fn register(&mut self, config: &DeviceConfig) -> Result<DeviceHandle> {
        if self.devices.iter().any(|d| d.device_id() == config.device_id) {
            return Err(TransportError::InvalidArg("device already registered"));
        }
        let handle = DeviceHandle(self.next_handle);
        let device = Device::new(handle, &self.host_name, config)?;
        self.next_handle += 1;
        self.devices.push(device);
        Ok(handle)
    }

    /// Removes a device; returns `false` when `device` is not registered.
    pub fn unregister(&mut self, device: DeviceHandle) -> bool {
        match self.index_of(device) {
            Some(index) => {
                let removed = self.devices.remove(index);
                debug!(device = removed.device_id(), "device unregistered");
                true
            }
            None => {
                warn!(?device, "unregistering an unknown device");
                false
            }
        }
    }

    fn index_of(&self, device: DeviceHandle) -> Option<usize> {
        self.devices.iter().position(|d| d.handle() == device)
    }

    fn device_mut(&mut self, device: DeviceHandle) -> Result<&mut Device> {
        self.devices
            .iter_mut()
            .find(|d| d.handle() == device)
            .ok_or(TransportError::InvalidArg("unknown device"))
    }

    /// A registered device, by handle.
    pub fn device(&self, device: DeviceHandle) -> Option<&Device> {
        self.devices.iter().find(|d| d.handle() == device)
    }

    /// Registered devices, in registration order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// The first registered device, the one [`do_work`](Self::do_work) drives.
    pub fn primary(&self) -> Option<DeviceHandle> {
        self.devices.first().map(Device::handle)
    }

    fn tick(&mut self, index: usize, queue: &mut MessageQueue, callbacks: &mut dyn TransportCallbacks) {
        let Some(device) = self.devices.get_mut(index) else {
            return;
        };
        device.do_event(&mut self.connection, self.batching, queue, callbacks);
        device.do_messages(&mut self.connection, self.minimum_polling_time, callbacks);
    }

    /// Runs one tick for the first registered device: the event step, then
    /// the poll step. Does nothing when no device is registered.
    pub fn do_work(&mut self, queue: &mut MessageQueue, callbacks: &mut dyn TransportCallbacks) {
        self.tick(0, queue, callbacks);
    }

    /// Runs one tick for `device`.
    pub fn do_work_device(
        &mut self,
        device: DeviceHandle,
        queue: &mut MessageQueue,
        callbacks: &mut dyn TransportCallbacks,
    ) -> Result<()> {
        let index = self
            .index_of(device)
            .ok_or(TransportError::InvalidArg("unknown device"))?;
        self.tick(index, queue, callbacks);
        Ok(())
    }

    /// Runs one tick for every registered device, in registration order.
    pub fn do_work_all(&mut self, owners: &mut dyn DeviceOwners) {
        for index in 0..self.devices.len() {
            let handle = self.devices[index].handle();
            if let Some((queue, callbacks)) = owners.owner(handle) {
                self.tick(index, queue, callbacks);
            }
        }
    }

    /// `Busy` while `queue` still holds events.
    pub fn send_status(&self, queue: &MessageQueue) -> SendStatus {
        if queue.is_empty() {
            SendStatus::Idle
        } else {
            SendStatus::Busy
        }
    }

    /// Host every request is sent to.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Id of the first registered device.
    pub fn device_id(&self) -> Option<&str> {
        self.devices.first().map(Device::device_id)
    }

    /// Starts polling for the first registered device.
    pub fn subscribe(&mut self) {
        if let Some(device) = self.devices.first_mut() {
            device.poll.subscribed = true;
        }
    }

    /// Stops polling for the first registered device.
    pub fn unsubscribe(&mut self) {
        if let Some(device) = self.devices.first_mut() {
            device.poll.subscribed = false;
        }
    }

    /// Whether the first registered device is polled.
    pub fn is_subscribed(&self) -> bool {
        self.devices.first().is_some_and(Device::is_subscribed)
    }

    /// Starts polling for `device`.
    pub fn subscribe_device(&mut self, device: DeviceHandle) -> Result<()> {
        self.device_mut(device)?.poll.subscribed = true;
        Ok(())
    }

    /// Stops polling for `device`.
    pub fn unsubscribe_device(&mut self, device: DeviceHandle) -> Result<()> {
        self.device_mut(device)?.poll.subscribed = false;
        Ok(())
    }

    /// Whether events are sent as one batch per tick.
    pub fn batching(&self) -> bool {
        self.batching
    }

    /// Seconds that must elapse between two polls of a device.
    pub fn minimum_polling_time(&self) -> u64 {
        self.minimum_polling_time
    }

    /// The shared HTTP engine.
    pub fn executor(&self) -> &E {
        &self.connection.executor
    }

    /// The shared HTTP engine, mutably.
    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.connection.executor
    }
}

#[cfg(test)]
mod tests;
