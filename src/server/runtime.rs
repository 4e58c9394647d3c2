//! Runtime control for [`Server`].

mod accept;
mod backoff;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use tokio::{pin, select, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Bound, Server, ServerError};
use crate::processor::Processor;

impl<P> Server<P, Bound>
where
    P: Processor,
{
    /// Run the server until Ctrl+C is received.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use parley::{config::ServerConfig, processor::ActionProcessor, server::Server};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let server = Server::new(ActionProcessor).bind(&ServerConfig::default())?;
    /// server.run().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use parley::{processor::ActionProcessor, server::Server};
    ///
    /// async fn try_run() {
    ///     Server::new(ActionProcessor)
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are retried with
    /// exponential back-off and do not surface as errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
            }
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// A connection in flight when `shutdown` resolves is served to
    /// completion; the listening socket is closed before this returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::Ipv4Addr;
    ///
    /// use parley::{config::ServerConfig, processor::ActionProcessor, server::Server};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ServerConfig::new("0")?.with_host(Ipv4Addr::LOCALHOST.into());
    /// let server = Server::new(ActionProcessor).bind(&config)?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle.await??;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are retried with
    /// exponential back-off and do not surface as errors.
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let Server {
            processor,
            settings,
            backoff_config,
            ready_tx,
            state: Bound { listener },
        } = self;
        let local_addr = listener.local_addr().ok();
        let token = CancellationToken::new();

        info!(?local_addr, "accepting connections");
        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("failed to send readiness signal: receiver dropped");
        }

        pin!(shutdown);
        {
            let serve = accept_loop(
                &listener,
                &processor,
                AcceptLoopOptions {
                    settings,
                    shutdown: token.clone(),
                    backoff: backoff_config,
                },
            );
            pin!(serve);

            select! {
                () = &mut shutdown => {
                    token.cancel();
                    serve.await;
                }
                () = &mut serve => {}
            }
        }

        drop(listener);
        info!(?local_addr, "server stopped");
        Ok(())
    }
}
