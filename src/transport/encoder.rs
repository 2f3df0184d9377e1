//! Turns queued messages into event request bodies and headers.
//!
//! Batched sends carry a JSON array, one object per message:
//!
//! ```text
//! [{"body":"<base64>","properties":{"iothub-app-k":"v"}},{"body":"text","base64Encoded":false}]
//! ```
//!
//! A single send carries the raw body, with properties moved into
//! `iothub-app-*` headers.

use base64::{Engine as _, engine::general_purpose};
use tracing::warn;

use crate::http::Headers;
use crate::message::{MessageContent, MessageQueue, OutgoingMessage, Properties};
use crate::utils::error::Result;

/// Largest accepted event, in bytes (255 KiB minus one).
pub const MAXIMUM_MESSAGE_SIZE: usize = 255 * 1024 - 1;
/// Fixed cost charged to every message on top of its body.
pub const MAXIMUM_PAYLOAD_OVERHEAD: usize = 384;
/// Fixed cost charged to every property on top of its name and value.
pub const MAXIMUM_PROPERTY_OVERHEAD: usize = 16;

pub const IOTHUB_APP_PREFIX: &str = "iothub-app-";
pub const IOTHUB_MESSAGE_ID: &str = "iothub-messageid";
pub const IOTHUB_CORRELATION_ID: &str = "iothub-correlationid";

pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_VND_MICROSOFT_IOTHUB_JSON: &str = "application/vnd.microsoft.iothub.json";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// One message rendered as an array element, trailing `,` included.
#[derive(Debug)]
struct BatchItem {
    json: String,
    size: usize,
}

fn properties_size(properties: &Properties) -> usize {
    properties
        .iter()
        .map(|(k, v)| k.len() + v.len() + MAXIMUM_PROPERTY_OVERHEAD)
        .sum()
}

fn encode_item(message: &OutgoingMessage) -> Result<BatchItem> {
    let mut json = String::from("{\"body\":");
    let body_len = match message.content() {
        MessageContent::Bytes(bytes) => {
            let encoded = general_purpose::STANDARD.encode(bytes);
            json.push('"');
            json.push_str(&encoded);
            json.push('"');
            encoded.len()
        }
        MessageContent::Text(text) => {
            let quoted = serde_json::to_string(text)?;
            json.push_str(&quoted);
            json.push_str(",\"base64Encoded\":false");
            quoted.len()
        }
    };

    let properties = message.properties();
    if !properties.is_empty() {
        json.push_str(",\"properties\":{");
        for (i, (key, value)) in properties.iter().enumerate() {
            if i > 0 {
                json.push(',');
            }
            json.push_str(&serde_json::to_string(&format!("{IOTHUB_APP_PREFIX}{key}"))?);
            json.push(':');
            json.push_str(&serde_json::to_string(value)?);
        }
        json.push('}');
    }
    json.push_str("},");

    Ok(BatchItem {
        json,
        size: body_len + MAXIMUM_PAYLOAD_OVERHEAD + properties_size(properties),
    })
}

/// Outcome of assembling a batch from the head of the queue.
#[derive(Debug)]
pub enum Payload {
    /// `body` is ready to send; `messages` left the queue to build it.
    Ready {
        body: String,
        messages: Vec<OutgoingMessage>,
    },
    /// Nothing is queued.
    NoItems,
    /// The oldest message alone is over the ceiling and left the queue.
    FirstItemDoesNotFit(OutgoingMessage),
}

/// Builds one batch out of as many queued messages as fit under
/// [`MAXIMUM_MESSAGE_SIZE`].
///
/// An error encoding the oldest message is returned with the queue untouched.
/// A later message that fails to encode, or would overflow the batch, ends it
/// and stays queued.
pub fn make_payload(queue: &mut MessageQueue) -> Result<Payload> {
    let Some(first) = queue.front() else {
        return Ok(Payload::NoItems);
    };
    let first = encode_item(first)?;
    if first.size > MAXIMUM_MESSAGE_SIZE {
        return Ok(queue
            .pop_front()
            .map_or(Payload::NoItems, Payload::FirstItemDoesNotFit));
    }

    let mut body = String::with_capacity(first.json.len() + 1);
    body.push('[');
    body.push_str(&first.json);
    let mut total = first.size;
    let mut count = 1;

    for message in queue.iter().skip(1) {
        let item = match encode_item(message) {
            Ok(item) => item,
            Err(e) => {
                warn!("closing batch early, unable to encode message: {}", e);
                break;
            }
        };
        if total + item.size > MAXIMUM_MESSAGE_SIZE {
            break;
        }
        body.push_str(&item.json);
        total += item.size;
        count += 1;
    }

    body.pop();
    body.push(']');
    Ok(Payload::Ready {
        body,
        messages: queue.take_front(count),
    })
}

/// Headers for a batched send: the event template with the batch content type.
pub fn batch_headers(template: &Headers) -> Result<Headers> {
    template
        .clone()
        .with(CONTENT_TYPE, APPLICATION_VND_MICROSOFT_IOTHUB_JSON)
}

/// Outcome of preparing the oldest message for a single send.
#[derive(Debug)]
pub enum SingleEvent {
    Ready(Headers),
    TooLarge,
}

/// Prepares headers for sending `message` on its own.
///
/// Size counts the raw body, [`MAXIMUM_PAYLOAD_OVERHEAD`] and every property.
pub fn single_event(template: &Headers, message: &OutgoingMessage) -> Result<SingleEvent> {
    let mut size = message.content().as_bytes().len() + MAXIMUM_PAYLOAD_OVERHEAD;
    if size > MAXIMUM_MESSAGE_SIZE {
        return Ok(SingleEvent::TooLarge);
    }

    let mut headers = template.clone().with(CONTENT_TYPE, APPLICATION_OCTET_STREAM)?;
    for (key, value) in message.properties().iter() {
        size += key.len() + value.len() + MAXIMUM_PROPERTY_OVERHEAD;
        if size > MAXIMUM_MESSAGE_SIZE {
            return Ok(SingleEvent::TooLarge);
        }
        headers.replace(&format!("{IOTHUB_APP_PREFIX}{key}"), value)?;
    }
    if let Some(id) = message.message_id() {
        headers.replace(IOTHUB_MESSAGE_ID, id)?;
    }
    if let Some(id) = message.correlation_id() {
        headers.replace(IOTHUB_CORRELATION_ID, id)?;
    }
    Ok(SingleEvent::Ready(headers))
}
