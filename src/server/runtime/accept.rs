//! Accept-loop utilities for server runtime.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backoff::BackoffConfig;
use crate::{
    metrics::{self, ErrorKind},
    processor::Processor,
    server::{ConnectionSettings, ServerError, connection::handle_connection},
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub settings: ConnectionSettings,
    pub shutdown: CancellationToken,
    pub backoff: BackoffConfig,
}

/// Accepts connections and serves each one to completion before the next.
///
/// Every accepted stream is handed to [`handle_connection`] and awaited, so
/// at most one connection is open at a time. Accept failures are logged and
/// followed by an exponential back-off governed by `options.backoff`; they
/// never end the loop. The loop ends when `options.shutdown` is cancelled:
/// immediately while waiting in `accept` or backing off, or once the
/// in-flight connection has closed.
pub(in crate::server) async fn accept_loop<P, L>(
    listener: &L,
    processor: &P,
    options: AcceptLoopOptions,
) where
    P: Processor,
    L: AcceptListener,
{
    let AcceptLoopOptions {
        settings,
        shutdown,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let mut delay = backoff.initial_delay;

    loop {
        let accepted = select! {
            biased;

            () = shutdown.cancelled() => break,
            res = listener.accept() => res,
        };

        match accepted {
            Ok((stream, peer_addr)) => {
                delay = backoff.initial_delay;
                handle_connection(stream, Some(peer_addr), processor, settings).await;
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                let error = ServerError::Accept(e);
                warn!(%error, ?local_addr, "accept failed; backing off");
                metrics::inc_errors(ErrorKind::Accept);
                select! {
                    biased;

                    () = shutdown.cancelled() => break,
                    () = sleep(delay) => {}
                }
                delay = backoff.next_delay(delay);
            }
        }
    }
    debug!("accept loop stopped");
}
