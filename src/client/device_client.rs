use tracing::debug;
use uuid::Uuid;

use crate::http::{HttpExecutor, OptionValue, ReqwestExecutor};
use crate::message::{
    ConfirmationResult, Disposition, InboundMessage, MessageQueue, OutgoingMessage, SendStatus,
};
use crate::transport::{HttpTransport, TransportCallbacks, TransportConfig};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::error::Result;

/// Decides the fate of each cloud-to-device message.
pub type MessageCallback = Box<dyn FnMut(&InboundMessage) -> Disposition + Send>;

/// Told once per event when it leaves the queue for good.
pub type ConfirmationCallback = Box<dyn FnMut(&OutgoingMessage, ConfirmationResult) + Send>;

#[derive(Default)]
struct Handlers {
    on_message: Option<MessageCallback>,
    on_confirmation: Option<ConfirmationCallback>,
}

impl TransportCallbacks for Handlers {
    fn send_complete(&mut self, messages: Vec<OutgoingMessage>, result: ConfirmationResult) {
        debug!(count = messages.len(), ?result, "events completed");
        if let Some(callback) = self.on_confirmation.as_mut() {
            for message in &messages {
                callback(message, result);
            }
        }
    }

    fn message_received(&mut self, message: &InboundMessage) -> Disposition {
        match self.on_message.as_mut() {
            Some(callback) => callback(message),
            None => Disposition::Abandoned,
        }
    }
}

/// A device connected to its hub over HTTP.
///
/// Nothing happens on the wire until [`do_work`](Self::do_work) is called;
/// the owner is expected to call it periodically from a single thread.
pub struct DeviceClient<E = ReqwestExecutor, C = SystemClock> {
    transport: HttpTransport<E, C>,
    queue: MessageQueue,
    handlers: Handlers,
}

impl<E, C> std::fmt::Debug for DeviceClient<E, C>
where
    E: std::fmt::Debug,
    C: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient")
            .field("transport", &self.transport)
            .field("queued", &self.queue.len())
            .field("has_message_callback", &self.handlers.on_message.is_some())
            .finish()
    }
}

impl DeviceClient {
    /// Creates a client for one device on top of a `reqwest` engine.
    pub fn create(config: &TransportConfig) -> Result<Self> {
        Ok(Self::from_transport(HttpTransport::create(config)?))
    }
}

impl<E: HttpExecutor, C: Clock> DeviceClient<E, C> {
    /// Wraps an existing transport with an empty queue and no callbacks.
    pub fn from_transport(transport: HttpTransport<E, C>) -> Self {
        Self {
            transport,
            queue: MessageQueue::new(),
            handlers: Handlers::default(),
        }
    }

    /// Queues `message` for the next tick and returns its tracking id.
    pub fn send_event(&mut self, message: OutgoingMessage) -> Uuid {
        let id = message.tracking_id();
        self.queue.push_back(message);
        id
    }

    /// Installs the message callback and starts polling.
    pub fn set_message_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&InboundMessage) -> Disposition + Send + 'static,
    {
        self.handlers.on_message = Some(Box::new(callback));
        self.transport.subscribe();
    }

    /// Removes the message callback and stops polling.
    pub fn clear_message_callback(&mut self) {
        self.handlers.on_message = None;
        self.transport.unsubscribe();
    }

    /// Installs the callback told about every completed event.
    pub fn set_confirmation_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&OutgoingMessage, ConfirmationResult) + Send + 'static,
    {
        self.handlers.on_confirmation = Some(Box::new(callback));
    }

    /// Forwards to [`HttpTransport::set_option`].
    pub fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<()> {
        self.transport.set_option(name, value)
    }

    /// `Busy` while events are still queued.
    pub fn send_status(&self) -> SendStatus {
        self.transport.send_status(&self.queue)
    }

    /// Number of events waiting to be sent.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Runs one transport tick: pending events first, then at most one poll.
    pub fn do_work(&mut self) {
        self.transport.do_work(&mut self.queue, &mut self.handlers);
    }

    /// The underlying transport.
    pub fn transport(&self) -> &HttpTransport<E, C> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut HttpTransport<E, C> {
        &mut self.transport
    }
}
