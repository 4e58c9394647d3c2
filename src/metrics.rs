//! Metric helpers for `parley`.
//!
//! This module defines metric names and helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers do nothing.

use crate::server::ConnectionOutcome;

/// Name of the gauge tracking open connections.
pub const CONNECTIONS_ACTIVE: &str = "parley_connections_active";
/// Name of the counter tracking finished connections, labelled by outcome.
pub const REQUESTS_TOTAL: &str = "parley_requests_total";
/// Name of the counter tracking error occurrences, labelled by kind.
pub const ERRORS_TOTAL: &str = "parley_errors_total";

/// Category of a recorded error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// `accept` failed on the listening socket.
    Accept,
    /// A request frame broke the framing grammar.
    Malformed,
    /// The processor rejected the request.
    Process,
    /// The processor panicked.
    Panic,
    /// The client did not deliver a request in time.
    Timeout,
    /// Reading from the connection failed.
    Read,
    /// Writing the response failed.
    Write,
}

impl ErrorKind {
    /// Label value used for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Accept => "accept",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Process => "process",
            ErrorKind::Panic => "panic",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Read => "read",
            ErrorKind::Write => "write",
        }
    }
}

/// Increment the open connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    ::metrics::gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the open connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    ::metrics::gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a finished connection.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables))]
pub fn inc_requests(outcome: ConnectionOutcome) {
    #[cfg(feature = "metrics")]
    ::metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Record an error occurrence.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables))]
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    ::metrics::counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Serve Prometheus metrics over HTTP on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the exporter cannot bind `addr` or a global recorder
/// is already installed.
#[cfg(feature = "metrics")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
}
