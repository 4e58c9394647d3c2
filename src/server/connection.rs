//! Lifecycle of a single accepted connection.
//!
//! A connection moves through [`ConnectionState`]:
//!
//! ```text
//! Accepted -> Reading -> Processing -> Writing -> Closed
//!     \__________\___________\____________\-> Error -> Closed
//! ```
//!
//! [`handle_connection`] owns the stream and every buffer derived from it, so
//! all of them are released when it returns, whichever path it took.

use std::{
    any::Any,
    fmt,
    io,
    net::SocketAddr,
    panic::{AssertUnwindSafe, catch_unwind},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, copy, sink},
    time::timeout,
};
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::{
    codec::{CodecError, DEFAULT_FRAME_LENGTH, RequestCodec, clamp_frame_length},
    message::{Request, Response},
    metrics::{self, ErrorKind},
    processor::{ProcessError, Processor},
};

/// Longest time spent discarding client input after the response.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Most bytes discarded after the response before the stream is dropped.
const DRAIN_LIMIT: u64 = 1024 * 1024;

/// Per-connection settings shared by every connection a server accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Largest request frame accepted, in bytes.
    pub max_frame_length: usize,
    /// Deadline for receiving a complete request.
    pub read_timeout: Option<Duration>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_FRAME_LENGTH,
            read_timeout: None,
        }
    }
}

impl ConnectionSettings {
    /// Set the frame limit, clamped to the codec bounds.
    #[must_use]
    pub fn with_max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = clamp_frame_length(length);
        self
    }
}

/// Stage of a connection's lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// The stream has been accepted and nothing has been read.
    Accepted,
    /// Waiting for a complete request frame.
    Reading,
    /// Running the processor.
    Processing,
    /// Writing the response.
    Writing,
    /// Something failed; an error response may still be written.
    Error,
    /// The stream has been shut down and released.
    Closed,
}

impl ConnectionState {
    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// ```
    /// use parley::server::ConnectionState;
    ///
    /// assert!(ConnectionState::Reading.can_transition_to(ConnectionState::Error));
    /// assert!(!ConnectionState::Closed.can_transition_to(ConnectionState::Reading));
    /// assert!(!ConnectionState::Error.can_transition_to(ConnectionState::Writing));
    /// ```
    #[must_use]
    pub const fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::{Accepted, Closed, Error, Processing, Reading, Writing};
        matches!(
            (self, next),
            (Accepted, Reading)
                | (Reading, Processing)
                | (Processing, Writing)
                | (Writing, Closed)
                | (Accepted | Reading | Processing | Writing, Error)
                | (Error, Closed)
        )
    }

    const fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::Reading => "reading",
            ConnectionState::Processing => "processing",
            ConnectionState::Writing => "writing",
            ConnectionState::Error => "error",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// How a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The processor answered and the response was written.
    Served,
    /// An error-shaped response was written.
    Rejected,
    /// The client closed the stream before sending any bytes.
    ClientClosed,
    /// Reading or writing failed; the client may have received nothing.
    Failed,
}

impl ConnectionOutcome {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            ConnectionOutcome::Served => "served",
            ConnectionOutcome::Rejected => "rejected",
            ConnectionOutcome::ClientClosed => "client_closed",
            ConnectionOutcome::Failed => "failed",
        }
    }
}

/// Failures confined to a single connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Reading or decoding the request failed.
    #[error(transparent)]
    Read(CodecError),

    /// The client did not deliver a complete request in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The processor panicked.
    #[error("internal error")]
    Panicked,

    /// Writing the response failed.
    #[error("write error: {0}")]
    Write(#[source] io::Error),
}

impl ConnectionError {
    /// Whether the client should still be told about this failure.
    fn is_reportable(&self) -> bool {
        match self {
            Self::Read(e) => e.is_malformed(),
            Self::Timeout(_) | Self::Panicked => true,
            Self::Write(_) => false,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Read(e) if e.is_malformed() => ErrorKind::Malformed,
            Self::Read(_) => ErrorKind::Read,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Panicked => ErrorKind::Panic,
            Self::Write(_) => ErrorKind::Write,
        }
    }
}

/// Tracks and logs state transitions for one connection.
struct Lifecycle {
    state: ConnectionState,
}

impl Lifecycle {
    fn new() -> Self {
        debug!(state = %ConnectionState::Accepted, "connection accepted");
        Self {
            state: ConnectionState::Accepted,
        }
    }

    fn enter(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid connection transition: {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "connection state");
        self.state = next;
    }

    fn fail(&mut self, err: &ConnectionError) {
        Self::record(err);
        self.enter(ConnectionState::Error);
    }

    /// Log and count `err` without changing state.
    fn record(err: &ConnectionError) {
        metrics::inc_errors(err.kind());
        match err {
            ConnectionError::Read(e) if !e.is_malformed() => {
                debug!(error = %err, "read failed");
            }
            ConnectionError::Write(_) => warn!(error = %err, "response not delivered"),
            _ => warn!(error = %err, "rejecting request"),
        }
    }
}

/// Serve one request on `stream`, then close it.
///
/// Reads a single request frame, answers it with `processor`, writes the
/// response and shuts the stream down. Malformed requests, unknown actions,
/// read timeouts and processor panics are answered with an error-shaped
/// response. A client that disconnects without sending anything, and any
/// transport failure, close the stream without writing.
///
/// The function never fails: every per-connection error is logged and
/// reflected in the returned [`ConnectionOutcome`].
///
/// # Examples
///
/// ```
/// use parley::{
///     processor::ActionProcessor,
///     server::{ConnectionOutcome, ConnectionSettings, handle_connection},
/// };
/// use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
///
/// # #[tokio::main]
/// # async fn main() -> std::io::Result<()> {
/// let (mut client, server) = duplex(256);
/// client.write_all(b"reverse abc\n").await?;
///
/// let outcome =
///     handle_connection(server, None, &ActionProcessor, ConnectionSettings::default()).await;
/// assert_eq!(outcome, ConnectionOutcome::Served);
///
/// let mut reply = String::new();
/// client.read_to_string(&mut reply).await?;
/// assert_eq!(reply, "cba\n");
/// # Ok(())
/// # }
/// ```
pub async fn handle_connection<T, P>(
    stream: T,
    peer_addr: Option<SocketAddr>,
    processor: &P,
    settings: ConnectionSettings,
) -> ConnectionOutcome
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    P: Processor,
{
    let span = debug_span!("connection", ?peer_addr);
    async move {
        metrics::inc_connections();
        let mut lifecycle = Lifecycle::new();
        let mut framed = Framed::new(stream, RequestCodec::new(settings.max_frame_length));

        let outcome = serve(&mut framed, &mut lifecycle, processor, settings).await;

        lifecycle.enter(ConnectionState::Closed);
        close(framed).await;
        metrics::dec_connections();
        metrics::inc_requests(outcome);
        debug!(outcome = outcome.as_str(), "connection closed");
        outcome
    }
    .instrument(span)
    .await
}

/// Drive the connection from `Reading` up to, but not including, `Closed`.
async fn serve<T, P>(
    framed: &mut Framed<T, RequestCodec>,
    lifecycle: &mut Lifecycle,
    processor: &P,
    settings: ConnectionSettings,
) -> ConnectionOutcome
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    P: Processor,
{
    lifecycle.enter(ConnectionState::Reading);
    let request = match read_request(framed, settings.read_timeout).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!("client closed before sending a request");
            lifecycle.enter(ConnectionState::Error);
            return ConnectionOutcome::ClientClosed;
        }
        Err(err) => return reject(framed, lifecycle, &err).await,
    };

    lifecycle.enter(ConnectionState::Processing);
    let response = match run_processor(processor, &request) {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            warn!(error = %err, action = %request.action, "request not processed");
            metrics::inc_errors(ErrorKind::Process);
            return finish(framed, lifecycle, Response::error(err), ConnectionOutcome::Rejected)
                .await;
        }
        Err(err) => return reject(framed, lifecycle, &err).await,
    };
    drop(request);

    finish(framed, lifecycle, response, ConnectionOutcome::Served).await
}

async fn read_request<T>(
    framed: &mut Framed<T, RequestCodec>,
    limit: Option<Duration>,
) -> Result<Option<Request>, ConnectionError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let next = match limit {
        Some(limit) => timeout(limit, framed.next())
            .await
            .map_err(|_| ConnectionError::Timeout(limit))?,
        None => framed.next().await,
    };
    next.transpose().map_err(ConnectionError::Read)
}

/// Run the processor, containing any panic to this connection.
fn run_processor<P: Processor>(
    processor: &P,
    request: &Request,
) -> Result<Result<Response, ProcessError>, ConnectionError> {
    catch_unwind(AssertUnwindSafe(|| processor.process(request))).map_err(|payload| {
        let panic = panic_message(payload.as_ref());
        error!(panic, action = %request.action, "processor panicked");
        ConnectionError::Panicked
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&'static str>().copied())
        .unwrap_or("<non-string panic payload>")
}

/// Enter `Error`, then answer the client if the failure warrants it.
async fn reject<T>(
    framed: &mut Framed<T, RequestCodec>,
    lifecycle: &mut Lifecycle,
    err: &ConnectionError,
) -> ConnectionOutcome
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    lifecycle.fail(err);
    if !err.is_reportable() {
        return ConnectionOutcome::Failed;
    }
    match write_response(framed, Response::error(err)).await {
        Ok(()) => ConnectionOutcome::Rejected,
        Err(write_err) => {
            Lifecycle::record(&write_err);
            ConnectionOutcome::Failed
        }
    }
}

/// Enter `Writing` and deliver `response`.
async fn finish<T>(
    framed: &mut Framed<T, RequestCodec>,
    lifecycle: &mut Lifecycle,
    response: Response,
    outcome: ConnectionOutcome,
) -> ConnectionOutcome
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    lifecycle.enter(ConnectionState::Writing);
    match write_response(framed, response).await {
        Ok(()) => outcome,
        Err(err) => {
            lifecycle.fail(&err);
            ConnectionOutcome::Failed
        }
    }
}

async fn write_response<T>(
    framed: &mut Framed<T, RequestCodec>,
    response: Response,
) -> Result<(), ConnectionError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    framed
        .send(response)
        .await
        .map_err(|e| ConnectionError::Write(e.into()))
}

/// Shut the stream down, drain what the client still sends, and release it.
///
/// Dropping a socket with unread input makes the kernel reset the connection,
/// which can destroy a response the client has not read yet. Draining is
/// bounded by [`DRAIN_TIMEOUT`] and [`DRAIN_LIMIT`]. Failures are not fatal.
async fn close<T>(framed: Framed<T, RequestCodec>)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = framed.into_inner();
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "stream shutdown failed");
    }
    let mut unread = (&mut stream).take(DRAIN_LIMIT);
    match timeout(DRAIN_TIMEOUT, copy(&mut unread, &mut sink())).await {
        Ok(Ok(0)) => {}
        Ok(Ok(discarded)) => debug!(discarded, "discarded unread input"),
        Ok(Err(e)) => debug!(error = %e, "draining input failed"),
        Err(_) => debug!("client kept the connection open after the response"),
    }
}
