//! Listener binding for [`Server`].

use std::{
    io,
    net::{SocketAddr, TcpListener as StdTcpListener},
};

use tokio::net::{TcpListener, TcpSocket};
use tracing::debug;

use crate::{
    config::ServerConfig,
    processor::Processor,
    server::{Bound, LISTEN_BACKLOG, Server, ServerError, ServerState, Unbound},
};

impl<P, S> Server<P, S>
where
    P: Processor,
    S: ServerState,
{
    fn into_bound(self, listener: TcpListener) -> Server<P, Bound> {
        let Server {
            processor,
            settings,
            backoff_config,
            ready_tx,
            ..
        } = self;
        if let Ok(addr) = listener.local_addr() {
            debug!(local_addr = %addr, "listening");
        }
        Server {
            processor,
            settings,
            backoff_config,
            ready_tx,
            state: Bound { listener },
        }
    }

    fn bind_config(mut self, config: &ServerConfig) -> Result<Server<P, Bound>, ServerError> {
        let listener = listen(config.socket_addr()?).map_err(ServerError::Bind)?;
        self.settings = self.settings.with_max_frame_length(config.max_frame_length());
        self.settings.read_timeout = config.read_timeout();
        Ok(self.into_bound(listener))
    }

    fn adopt_listener(self, std_listener: StdTcpListener) -> Result<Server<P, Bound>, ServerError> {
        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;
        Ok(self.into_bound(listener))
    }
}

/// Create a passive socket on `addr` with the fixed backlog.
fn listen(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

impl<P> Server<P, Unbound>
where
    P: Processor,
{
    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Resolve the configured port, then create, bind and listen on a socket.
    ///
    /// The frame limit and read timeout from `config` replace the server's
    /// connection settings. Must be called from within a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::Ipv4Addr;
    ///
    /// use parley::{config::ServerConfig, processor::ActionProcessor, server::Server};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ServerConfig::new("0")?.with_host(Ipv4Addr::LOCALHOST.into());
    /// let server = Server::new(ActionProcessor).bind(&config)?;
    /// assert!(server.local_addr().is_some());
    /// server.shutdown();
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Resolve`] if the port names an unknown service
    /// and [`ServerError::Bind`] if the socket cannot be created, bound or put
    /// into listening mode.
    pub fn bind(self, config: &ServerConfig) -> Result<Server<P, Bound>, ServerError> {
        self.bind_config(config)
    }

    /// Adopt an existing, already bound `StdTcpListener`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<Server<P, Bound>, ServerError> {
        self.adopt_listener(std_listener)
    }
}

impl<P> Server<P, Bound>
where
    P: Processor,
{
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }

    /// Close the listening socket.
    ///
    /// Consumes the server, so no further `accept` can happen and the socket
    /// cannot be closed twice.
    pub fn shutdown(self) {
        let local_addr = self.local_addr();
        drop(self.state.listener);
        debug!(?local_addr, "listener closed");
    }
}
