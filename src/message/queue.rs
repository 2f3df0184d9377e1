use std::collections::VecDeque;

use crate::message::outgoing::OutgoingMessage;

/// Ordered queue of device-to-cloud messages waiting to be sent.
///
/// The queue is owned by the client layer and lent to the transport for the
/// duration of a tick. Messages picked for a request are moved out with
/// [`take_front`](Self::take_front); if the request fails they are put back
/// with [`restore_front`](Self::restore_front), ahead of anything queued since,
/// in their original relative order.
#[derive(Debug, Default)]
pub struct MessageQueue {
    items: VecDeque<OutgoingMessage>,
}

impl MessageQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `message` behind every other one.
    pub fn push_back(&mut self, message: OutgoingMessage) {
        self.items.push_back(message);
    }

    /// Removes the oldest message.
    pub fn pop_front(&mut self) -> Option<OutgoingMessage> {
        self.items.pop_front()
    }

    /// The oldest message, left in place.
    pub fn front(&self) -> Option<&OutgoingMessage> {
        self.items.front()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Messages from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &OutgoingMessage> {
        self.items.iter()
    }

    /// Moves the first `count` messages (or all, if fewer) out of the queue.
    pub fn take_front(&mut self, count: usize) -> Vec<OutgoingMessage> {
        let count = count.min(self.items.len());
        self.items.drain(..count).collect()
    }

    /// Puts `messages` back at the head of the queue, keeping their order.
    pub fn restore_front(&mut self, messages: Vec<OutgoingMessage>) {
        for message in messages.into_iter().rev() {
            self.items.push_front(message);
        }
    }
}

impl Extend<OutgoingMessage> for MessageQueue {
    fn extend<T: IntoIterator<Item = OutgoingMessage>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}
