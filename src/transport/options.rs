use tracing::debug;

use super::HttpTransport;
use crate::http::{HttpExecutor, OptionValue};
use crate::utils::clock::Clock;
use crate::utils::error::{HttpError, Result, TransportError};

/// Switches between batched (`true`) and single event sends.
pub const OPTION_BATCHING: &str = "Batching";
/// Minimum number of seconds between two polls.
pub const OPTION_MINIMUM_POLLING_TIME: &str = "MinimumPollingTime";

impl<E: HttpExecutor, C: Clock> HttpTransport<E, C> {
    /// Sets a transport option, or hands it to the HTTP engine when the
    /// transport does not know it.
    pub fn set_option(&mut self, name: &str, value: &OptionValue) -> Result<()> {
        if name.is_empty() {
            return Err(TransportError::InvalidArg("option name"));
        }
        match (name, value) {
            (OPTION_BATCHING, OptionValue::Bool(batching)) => {
                self.batching = *batching;
            }
            (OPTION_BATCHING, _) => return Err(TransportError::InvalidArg("Batching expects a bool")),
            (OPTION_MINIMUM_POLLING_TIME, OptionValue::UInt(secs)) => {
                self.minimum_polling_time = *secs;
            }
            (OPTION_MINIMUM_POLLING_TIME, _) => {
                return Err(TransportError::InvalidArg(
                    "MinimumPollingTime expects an unsigned integer",
                ));
            }
            _ => {
                self.connection
                    .executor
                    .set_option(name, value)
                    .map_err(|source| match source {
                        HttpError::InvalidArg(_) => TransportError::InvalidArg("http option"),
                        source => TransportError::Option {
                            name: name.to_string(),
                            source,
                        },
                    })?;
            }
        }
        debug!(option = name, "option set");
        Ok(())
    }
}
