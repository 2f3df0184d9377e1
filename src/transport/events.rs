use tracing::{debug, error, warn};

use super::device::Device;
use super::encoder::{self, Payload, SingleEvent};
use super::{Connection, TransportCallbacks};
use crate::http::{HttpExecutor, Method, Request};
use crate::message::{ConfirmationResult, MessageQueue};
use crate::utils::clock::Clock;

impl Device {
    pub(super) fn do_event<E: HttpExecutor, C: Clock>(
        &self,
        connection: &mut Connection<E, C>,
        batching: bool,
        queue: &mut MessageQueue,
        callbacks: &mut dyn TransportCallbacks,
    ) {
        if queue.is_empty() {
            return;
        }
        if batching {
            self.send_batch(connection, queue, callbacks);
        } else {
            self.send_single(connection, queue, callbacks);
        }
    }

    fn send_batch<E: HttpExecutor, C: Clock>(
        &self,
        connection: &mut Connection<E, C>,
        queue: &mut MessageQueue,
        callbacks: &mut dyn TransportCallbacks,
    ) {
        let headers = match encoder::batch_headers(&self.event_headers) {
            Ok(headers) => headers,
            Err(e) => {
                error!("unable to set batch content type: {}", e);
                return;
            }
        };

        let (body, messages) = match encoder::make_payload(queue) {
            Ok(Payload::Ready { body, messages }) => (body, messages),
            Ok(Payload::FirstItemDoesNotFit(message)) => {
                warn!(
                    device = self.device_id(),
                    tracking_id = %message.tracking_id(),
                    "message exceeds the maximum event size, dropping it"
                );
                callbacks.send_complete(vec![message], ConfirmationResult::Error);
                return;
            }
            Ok(Payload::NoItems) => return,
            Err(e) => {
                error!("unrecoverable error while building a batch: {}", e);
                return;
            }
        };

        let request = Request {
            method: Method::Post,
            relative_path: self.paths.event(),
            headers: &headers,
            body: Some(body.as_bytes()),
        };
        match connection.execute(self.sas.as_ref(), &request) {
            Ok(response) if response.status < 300 => {
                debug!(count = messages.len(), status = response.status, "batch sent");
                callbacks.send_complete(messages, ConfirmationResult::Ok);
            }
            Ok(response) => {
                error!("unexpected HTTP status code ({})", response.status);
                queue.restore_front(messages);
            }
            Err(e) => {
                error!("unable to send batch: {}", e);
                queue.restore_front(messages);
            }
        }
    }

    fn send_single<E: HttpExecutor, C: Clock>(
        &self,
        connection: &mut Connection<E, C>,
        queue: &mut MessageQueue,
        callbacks: &mut dyn TransportCallbacks,
    ) {
        let Some(message) = queue.front() else {
            return;
        };
        let headers = match encoder::single_event(&self.event_headers, message) {
            Ok(SingleEvent::Ready(headers)) => headers,
            Ok(SingleEvent::TooLarge) => {
                if let Some(message) = queue.pop_front() {
                    warn!(
                        device = self.device_id(),
                        tracking_id = %message.tracking_id(),
                        "message exceeds the maximum event size, dropping it"
                    );
                    callbacks.send_complete(vec![message], ConfirmationResult::Error);
                }
                return;
            }
            Err(e) => {
                error!("unable to build event headers: {}", e);
                return;
            }
        };

        let request = Request {
            method: Method::Post,
            relative_path: self.paths.event(),
            headers: &headers,
            body: Some(message.content().as_bytes()),
        };
        match connection.execute(self.sas.as_ref(), &request) {
            Ok(response) if response.status < 300 => {
                debug!(status = response.status, "event sent");
                if let Some(sent) = queue.pop_front() {
                    callbacks.send_complete(vec![sent], ConfirmationResult::Ok);
                }
            }
            Ok(response) => error!("unexpected HTTP status code ({})", response.status),
            Err(e) => error!("unable to send event: {}", e),
        }
    }
}
