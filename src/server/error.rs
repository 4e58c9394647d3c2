//! Errors raised by [`Server`](super::Server) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while creating or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Creating, binding or listening on the socket failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),

    /// The configured service name does not map to a port.
    #[error("cannot resolve service {service:?} to a port")]
    Resolve {
        /// Port token as configured.
        service: String,
    },

    /// Accepting a connection failed.
    #[error("accept error: {0}")]
    Accept(#[source] io::Error),
}
