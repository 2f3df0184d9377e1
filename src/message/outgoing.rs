use uuid::Uuid;

use crate::message::properties::Properties;

/// Body of a device-to-cloud message.
///
/// A message carries either raw bytes or a string, never both. The variant
/// decides how the body is encoded in a batch: bytes are base64-encoded,
/// strings are written as a JSON string with `"base64Encoded":false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Bytes(Vec<u8>),
    Text(String),
}

impl MessageContent {
    /// The body as it is sent when the message travels alone.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MessageContent::Bytes(bytes) => bytes,
            MessageContent::Text(text) => text.as_bytes(),
        }
    }
}

/// A device-to-cloud message waiting in (or removed from) the send queue.
///
/// # Fields
///
/// - `tracking_id` - Opaque identity assigned at creation. Completion callbacks
///   use it to tell messages apart; it never goes on the wire.
/// - `content` - The message body.
/// - `properties` - Application properties, sent as `iothub-app-<name>`.
/// - `message_id` / `correlation_id` - Optional system properties, sent as
///   `iothub-messageid` / `iothub-correlationid` on single sends.
///
/// # Example
///
/// ```rust
/// use iothub_http::message::OutgoingMessage;
///
/// let msg = OutgoingMessage::from_text("{\"temp\":25}")
///     .with_property("unit", "celsius")
///     .with_message_id("msg-1");
/// assert_eq!(msg.properties().get("unit"), Some("celsius"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    tracking_id: Uuid,
    content: MessageContent,
    properties: Properties,
    message_id: Option<String>,
    correlation_id: Option<String>,
}

impl OutgoingMessage {
    /// A message with a fresh tracking id and no properties.
    pub fn new(content: MessageContent) -> Self {
        Self {
            tracking_id: Uuid::new_v4(),
            content,
            properties: Properties::new(),
            message_id: None,
            correlation_id: None,
        }
    }

    /// A binary message, base64-encoded when batched.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageContent::Bytes(bytes.into()))
    }

    /// A text message, sent as a JSON string when batched.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(MessageContent::Text(text.into()))
    }

    /// Adds or replaces an application property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.add_or_update(key, value);
        self
    }

    /// Sets the `iothub-messageid` value.
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Sets the `iothub-correlationid` value.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Local id reported back in confirmations.
    pub fn tracking_id(&self) -> Uuid {
        self.tracking_id
    }

    /// The body, bytes or text.
    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Application properties, in insertion order.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Application properties, for in-place edits.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Id sent as `iothub-messageid`, if set.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Id sent as `iothub-correlationid`, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}
