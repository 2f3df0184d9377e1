//! The `message` module defines the messages exchanged with the hub.
//!
//! - `outgoing`: device-to-cloud messages and their body variants.
//! - `inbound`: cloud-to-device messages plus the disposition and
//!   confirmation enums that close their lifecycle.
//! - `properties`: the ordered application-property map shared by both.
//! - `queue`: the send queue the client layer lends to the transport.

pub mod inbound;
pub mod outgoing;
pub mod properties;
pub mod queue;

pub use inbound::{ConfirmationResult, Disposition, InboundMessage, SendStatus};
pub use outgoing::{MessageContent, OutgoingMessage};
pub use properties::Properties;
pub use queue::MessageQueue;
