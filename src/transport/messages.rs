use tracing::{debug, error, warn};

use super::encoder::{IOTHUB_APP_PREFIX, IOTHUB_CORRELATION_ID, IOTHUB_MESSAGE_ID};
use super::device::Device;
use super::{Connection, TransportCallbacks};
use crate::http::{HttpExecutor, Method, Request, Response};
use crate::message::{Disposition, InboundMessage};
use crate::utils::clock::Clock;
use crate::utils::error::{Result, TransportError};

pub const ETAG: &str = "ETag";
pub const IF_MATCH: &str = "If-Match";

/// Strips the quotes off a well-formed ETag header value.
fn unquote_etag(value: &str) -> Option<&str> {
    if value.len() < 2 {
        return None;
    }
    value.strip_prefix('"')?.strip_suffix('"')
}

fn app_property_name(header: &str) -> Option<&str> {
    let prefix = header.get(..IOTHUB_APP_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(IOTHUB_APP_PREFIX) {
        header.get(IOTHUB_APP_PREFIX.len()..)
    } else {
        None
    }
}

/// Builds the inbound message out of a poll response.
///
/// A reserved `iothub-` header the engine had to drop fails the assembly.
fn materialize(response: Response, etag: &str) -> Result<InboundMessage> {
    if let Some(name) = response
        .dropped_headers
        .iter()
        .find(|name| name.to_ascii_lowercase().starts_with("iothub-"))
    {
        return Err(TransportError::Header {
            name: name.clone(),
            reason: "value could not be read",
        });
    }
    let mut message = InboundMessage::new(response.body, etag);
    for (name, value) in response.headers.iter() {
        if let Some(key) = app_property_name(name) {
            if key.is_empty() {
                return Err(TransportError::InvalidArg("property name"));
            }
            message.properties.add_or_update(key, value);
        } else if name.eq_ignore_ascii_case(IOTHUB_MESSAGE_ID) {
            message.message_id = Some(value.to_string());
        } else if name.eq_ignore_ascii_case(IOTHUB_CORRELATION_ID) {
            message.correlation_id = Some(value.to_string());
        }
    }
    Ok(message)
}

impl Device {
    fn poll_allowed(&self, now: Option<i64>, minimum_polling_time: u64) -> bool {
        if self.poll.is_first_poll {
            return true;
        }
        match now {
            None => true,
            Some(now) => u64::try_from(now.saturating_sub(self.poll.last_poll_time))
                .is_ok_and(|elapsed| elapsed > minimum_polling_time),
        }
    }

    pub(super) fn do_messages<E: HttpExecutor, C: Clock>(
        &mut self,
        connection: &mut Connection<E, C>,
        minimum_polling_time: u64,
        callbacks: &mut dyn TransportCallbacks,
    ) {
        if !self.poll.subscribed {
            return;
        }
        let now = connection.clock.now();
        if !self.poll_allowed(now, minimum_polling_time) {
            return;
        }

        let request = Request {
            method: Method::Get,
            relative_path: self.paths.message(),
            headers: &self.message_headers,
            body: None,
        };
        let response = match connection.execute(self.sas.as_ref(), &request) {
            Ok(response) => response,
            Err(e) => {
                error!(device = self.device_id(), "unable to poll for messages: {}", e);
                return;
            }
        };

        match now {
            Some(now) => {
                self.poll.is_first_poll = false;
                self.poll.last_poll_time = now;
            }
            None => self.poll.is_first_poll = true,
        }

        match response.status {
            200 => {}
            204 => {
                debug!("no cloud-to-device message waiting");
                return;
            }
            status => {
                warn!("unexpected HTTP status code ({}) while polling", status);
                return;
            }
        }

        let Some(quoted) = response.headers.find(ETAG) else {
            error!("poll response carries no ETag");
            return;
        };
        let Some(etag) = unquote_etag(quoted).map(str::to_string) else {
            error!("poll response carries a malformed ETag: {:?}", quoted);
            return;
        };

        let disposition = match materialize(response, &etag) {
            Ok(message) => callbacks.message_received(&message),
            Err(e) => {
                error!("unable to assemble inbound message, abandoning it: {}", e);
                Disposition::Abandoned
            }
        };
        self.settle(connection, &etag, disposition);
    }

    /// Sends the disposition request for the message identified by `etag`.
    fn settle<E: HttpExecutor, C: Clock>(
        &self,
        connection: &mut Connection<E, C>,
        etag: &str,
        disposition: Disposition,
    ) {
        let headers = match self
            .message_headers
            .clone()
            .with(IF_MATCH, &format!("\"{etag}\""))
        {
            Ok(headers) => headers,
            Err(e) => {
                error!("unable to build disposition headers: {}", e);
                return;
            }
        };

        let (method, path) = match disposition {
            Disposition::Accepted => (Method::Delete, self.paths.accept(etag)),
            Disposition::Rejected => (Method::Delete, self.paths.reject(etag)),
            Disposition::Abandoned => (Method::Post, self.paths.abandon(etag)),
        };
        let request = Request {
            method,
            relative_path: &path,
            headers: &headers,
            body: None,
        };
        match connection.execute(self.sas.as_ref(), &request) {
            Ok(response) if response.status == 204 => {
                debug!(?disposition, "message disposition completed");
            }
            Ok(response) => warn!(
                ?disposition,
                "unexpected HTTP status code ({}) for disposition", response.status
            ),
            Err(e) => error!(?disposition, "unable to send disposition: {}", e),
        }
    }
}
