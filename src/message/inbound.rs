use crate::message::properties::Properties;

/// A cloud-to-device message fetched by a poll.
///
/// Lives only for the duration of one poll: it is handed to the message
/// callback by reference and dropped once the disposition request is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub(crate) body: Vec<u8>,
    pub(crate) etag: String,
    pub(crate) properties: Properties,
    pub(crate) message_id: Option<String>,
    pub(crate) correlation_id: Option<String>,
}

impl InboundMessage {
    pub(crate) fn new(body: Vec<u8>, etag: impl Into<String>) -> Self {
        Self {
            body,
            etag: etag.into(),
            properties: Properties::new(),
            message_id: None,
            correlation_id: None,
        }
    }

    /// Raw body bytes of the poll response.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The ETag without its surrounding quotes.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Properties rebuilt from `iothub-app-*` headers.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Value of the `iothub-messageid` header, if any.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Value of the `iothub-correlationid` header, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

/// What the consumer decided to do with an [`InboundMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Completes the message; the hub deletes it.
    Accepted,
    /// Dead-letters the message.
    Rejected,
    /// Returns the message to the hub queue for redelivery.
    Abandoned,
}

/// Outcome reported for messages leaving the send queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationResult {
    Ok,
    Error,
}

/// Whether the transport still has events to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Idle,
    Busy,
}
