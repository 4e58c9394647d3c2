//! Configuration utilities for [`Server`].

use std::time::Duration;

use tokio::sync::oneshot;

use super::{BackoffConfig, ConnectionSettings, Server, ServerState, Unbound};
use crate::processor::Processor;

pub mod binding;

#[cfg(test)]
mod tests;

impl<P> Server<P, Unbound>
where
    P: Processor,
{
    /// Create a new unbound `Server` around `processor`.
    ///
    /// Connections use the default [`ConnectionSettings`] and accept failures
    /// back off according to [`BackoffConfig::default`]. Call
    /// [`bind`](Server::bind) before running the server.
    ///
    /// ```
    /// use parley::{processor::ActionProcessor, server::Server};
    ///
    /// let server = Server::new(ActionProcessor);
    /// assert!(server.local_addr().is_none());
    /// ```
    #[must_use]
    pub fn new(processor: P) -> Self {
        Self {
            processor,
            settings: ConnectionSettings::default(),
            backoff_config: BackoffConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<P, S> Server<P, S>
where
    P: Processor,
    S: ServerState,
{
    /// Limit the size of request frames, clamped to the codec bounds.
    #[must_use]
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.settings = self.settings.with_max_frame_length(length);
        self
    }

    /// Give each client at most `limit` to deliver its request.
    #[must_use]
    pub fn read_timeout(mut self, limit: Duration) -> Self {
        self.settings.read_timeout = Some(limit);
        self
    }

    /// Configure exponential back-off applied after failed `accept` calls.
    ///
    /// The values are normalised with [`BackoffConfig::normalized`].
    #[must_use]
    pub fn accept_backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff_config = config.normalized();
        self
    }

    /// Configure a channel used to signal when the server starts accepting.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Settings applied to every connection.
    #[inline]
    #[must_use]
    pub const fn connection_settings(&self) -> ConnectionSettings { self.settings }

    /// Back-off applied after failed `accept` calls.
    #[inline]
    #[must_use]
    pub const fn backoff_config(&self) -> BackoffConfig { self.backoff_config }

    /// The processor answering requests.
    #[must_use]
    pub fn processor(&self) -> &P { &self.processor }
}
