//! Background server harness.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
};

use parley::{Server, ServerError, processor::Processor, server::Unbound};
use rstest::fixture;
use tokio::{sync::oneshot, task::JoinHandle};

/// Bind a listener on a free loopback port.
///
/// Keeping the listener bound prevents another process from claiming the
/// port between discovery and use.
///
/// # Panics
///
/// Panics if no loopback port can be bound.
#[fixture]
pub fn unused_listener() -> StdTcpListener {
    bind_loopback().expect("failed to bind loopback listener")
}

fn bind_loopback() -> io::Result<StdTcpListener> {
    StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
}

/// A [`Server`] running on a background task.
///
/// Dropping the harness without calling [`TestServer::stop`] aborts the
/// task.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    /// Start a server with default settings on a free loopback port.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be set up.
    pub async fn start<P: Processor>(processor: P) -> Result<Self, ServerError> {
        Self::start_with(processor, |server| server).await
    }

    /// Start a server after applying `configure` to the unbound builder.
    ///
    /// Returns once the server signals that it is accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be set up.
    pub async fn start_with<P, F>(processor: P, configure: F) -> Result<Self, ServerError>
    where
        P: Processor,
        F: FnOnce(Server<P, Unbound>) -> Server<P, Unbound>,
    {
        let listener = bind_loopback().map_err(ServerError::Bind)?;
        Self::start_on(processor, listener, configure).await
    }

    /// Start a server on `listener` after applying `configure`.
    ///
    /// Pair with the [`unused_listener`] fixture to know the address up
    /// front.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be adopted.
    pub async fn start_on<P, F>(
        processor: P,
        listener: StdTcpListener,
        configure: F,
    ) -> Result<Self, ServerError>
    where
        P: Processor,
        F: FnOnce(Server<P, Unbound>) -> Server<P, Unbound>,
    {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = configure(Server::new(processor))
            .ready_signal(ready_tx)
            .bind_existing_listener(listener)?;
        let addr = server
            .local_addr()
            .ok_or_else(|| ServerError::Bind(io::Error::other("listener has no address")))?;

        let handle = tokio::spawn(server.run_with_shutdown(async {
            let _ = shutdown_rx.await;
        }));
        // A dropped sender means the task already ended; `stop` reports why.
        let _ = ready_rx.await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Address the server listens on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Signal shutdown and wait for the server task to finish.
    ///
    /// # Errors
    ///
    /// Returns the server's own error, if it failed.
    ///
    /// # Panics
    ///
    /// Panics if the server task panicked.
    pub async fn stop(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.expect("server task panicked"),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
