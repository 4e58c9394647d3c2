//! Tokio-based TCP server for [`Processor`] implementations.
//!
//! [`Server`] accepts connections one at a time. Each accepted connection is
//! driven through its whole lifecycle (read, process, write, close) by
//! [`handle_connection`] before the next `accept`.

use tokio::{net::TcpListener, sync::oneshot};

use crate::processor::Processor;

/// Pending connections the listening socket queues before refusing more.
pub const LISTEN_BACKLOG: u32 = 10;

/// Sequential TCP server answering one request per connection.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`Server::bind`] or
/// [`Server::bind_existing_listener`] before running.
pub struct Server<P, S = Unbound>
where
    P: Processor,
    S: ServerState,
{
    pub(crate) processor: P,
    pub(crate) settings: ConnectionSettings,
    pub(crate) backoff_config: BackoffConfig,
    /// Notified once, just before the accept loop starts.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server owns a listening socket.
#[derive(Debug)]
pub struct Bound {
    pub(crate) listener: TcpListener,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
pub use config::binding;
pub mod connection;
pub mod error;
mod runtime;

pub use connection::{ConnectionOutcome, ConnectionSettings, ConnectionState, handle_connection};
pub use error::ServerError;
/// Re-exported configuration types for server backoff behaviour.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
