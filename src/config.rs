//! Validated server configuration.
//!
//! [`ServerConfig`] is built once from the command line and read by the
//! server for the rest of the process lifetime.

use std::{
    ffi::OsString,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use clap::{Parser, error::ErrorKind};
use thiserror::Error;

use crate::{
    cli::{Cli, DEFAULT_PORT},
    codec::clamp_frame_length,
    server::ServerError,
};

/// Well-known service names accepted in place of a numeric port.
const SERVICES: &[(&str, u16)] = &[("echo", 7), ("http", 80), ("https", 443), ("http-alt", 8080)];

/// Errors raised while building a [`ServerConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The arguments were malformed or a required value was missing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Help or version output was requested instead of a configuration.
    #[error("{0}")]
    HelpRequested(String),
}

/// Settings consumed by [`Server::bind`](crate::server::Server::bind).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    port: String,
    host: IpAddr,
    max_frame_length: usize,
    read_timeout: Option<Duration>,
    metrics_addr: Option<SocketAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_owned(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_frame_length: crate::codec::DEFAULT_FRAME_LENGTH,
            read_timeout: None,
            metrics_addr: None,
        }
    }
}

impl ServerConfig {
    /// Build a configuration listening on `port` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidArgument`] if `port` is not a plausible
    /// port number or service name.
    pub fn new(port: impl Into<String>) -> Result<Self, ConfigError> {
        let port = port.into();
        validate_port(&port)?;
        Ok(Self {
            port,
            ..Self::default()
        })
    }

    /// Bind to `host` instead of every interface.
    #[must_use]
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Limit the size of a request frame, clamped to the codec bounds.
    #[must_use]
    pub fn with_max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = clamp_frame_length(length);
        self
    }

    /// Give clients at most `limit` to deliver a complete request.
    #[must_use]
    pub fn with_read_timeout(mut self, limit: Duration) -> Self {
        self.read_timeout = Some(limit);
        self
    }

    /// Serve Prometheus metrics on `addr`.
    #[must_use]
    pub fn with_metrics_addr(mut self, addr: SocketAddr) -> Self {
        self.metrics_addr = Some(addr);
        self
    }

    /// The configured port token, as given.
    #[must_use]
    pub fn port(&self) -> &str { &self.port }

    /// The local interface address to bind.
    #[must_use]
    pub const fn host(&self) -> IpAddr { self.host }

    /// Largest request frame accepted.
    #[must_use]
    pub const fn max_frame_length(&self) -> usize { self.max_frame_length }

    /// Per-connection read deadline, if any.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> { self.read_timeout }

    /// Address of the Prometheus exporter, if requested.
    #[must_use]
    pub const fn metrics_addr(&self) -> Option<SocketAddr> { self.metrics_addr }

    /// Resolve the host and port into the address to bind.
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use parley::config::ServerConfig;
    ///
    /// let config = ServerConfig::new("http")?.with_host(Ipv4Addr::LOCALHOST.into());
    /// assert_eq!(config.socket_addr()?, SocketAddr::from((Ipv4Addr::LOCALHOST, 80)));
    /// # Ok::<_, Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Resolve`] if the port is a service name outside
    /// the table of well-known services.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let port = resolve_port(&self.port).ok_or_else(|| ServerError::Resolve {
            service: self.port.clone(),
        })?;
        Ok(SocketAddr::new(self.host, port))
    }
}

impl TryFrom<Cli> for ServerConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let mut config = Self::new(cli.port)?
            .with_host(cli.host)
            .with_max_frame_length(cli.max_frame_length);
        match cli.read_timeout_ms {
            Some(0) => {
                return Err(ConfigError::InvalidArgument(
                    "read timeout must be greater than zero".to_owned(),
                ));
            }
            Some(ms) => config = config.with_read_timeout(Duration::from_millis(ms)),
            None => {}
        }
        if let Some(addr) = cli.metrics_addr {
            config = config.with_metrics_addr(addr);
        }
        Ok(config)
    }
}

/// Parse command line arguments into a [`ServerConfig`].
///
/// The first item is the program name, as with [`std::env::args_os`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidArgument`] if the arguments cannot be parsed
/// or carry an implausible port, and [`ConfigError::HelpRequested`] with the
/// rendered text when `--help` or `--version` is given.
///
/// # Examples
///
/// ```
/// use parley::config::parse_arguments;
///
/// let config = parse_arguments(["parley", "--port", "9000"]).expect("valid arguments");
/// assert_eq!(config.port(), "9000");
/// assert!(parse_arguments(["parley", "--port", ""]).is_err());
/// ```
pub fn parse_arguments<I, T>(args: I) -> Result<ServerConfig, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            ConfigError::HelpRequested(e.to_string())
        }
        _ => ConfigError::InvalidArgument(e.to_string()),
    })?;
    ServerConfig::try_from(cli)
}

fn validate_port(port: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidArgument(format!("port {port:?} {reason}"));
    let Some(first) = port.chars().next() else {
        return Err(ConfigError::InvalidArgument("port must not be empty".to_owned()));
    };
    if port.bytes().all(|b| b.is_ascii_digit()) {
        return port
            .parse::<u16>()
            .map(|_| ())
            .map_err(|_| invalid("is out of range"));
    }
    if !first.is_ascii_alphabetic() {
        return Err(invalid("is neither a number nor a service name"));
    }
    if !port.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("contains characters not allowed in a service name"));
    }
    Ok(())
}

/// Resolve a validated port token to a port number.
///
/// Numeric tokens map directly; service names are looked up in a fixed table
/// of well-known services. Returns `None` for names outside that table.
#[must_use]
pub fn resolve_port(port: &str) -> Option<u16> {
    if let Ok(number) = port.parse::<u16>() {
        return Some(number);
    }
    SERVICES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(port))
        .map(|&(_, number)| number)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::codec::{MAX_FRAME_LENGTH, MIN_FRAME_LENGTH};

    #[test]
    fn defaults_to_well_known_port() {
        let config = parse_arguments(["parley"]).expect("no arguments is valid");
        assert_eq!(config.port(), "8083");
        assert_eq!(config.host(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.read_timeout(), None);
    }

    #[rstest]
    #[case("0")]
    #[case("65535")]
    #[case("http")]
    #[case("http-alt")]
    fn accepts_plausible_ports(#[case] port: &str) {
        let config = ServerConfig::new(port).expect("port should be accepted");
        assert_eq!(config.port(), port);
    }

    #[rstest]
    #[case("")]
    #[case("65536")]
    #[case("-1")]
    #[case("80a!")]
    #[case("8o8o")]
    fn rejects_implausible_ports(#[case] port: &str) {
        let err = ServerConfig::new(port).expect_err("port should be rejected");
        assert!(matches!(err, ConfigError::InvalidArgument(_)));
    }

    #[test]
    fn malformed_arguments_are_invalid() {
        let err = parse_arguments(["parley", "--port"]).expect_err("missing value");
        assert!(matches!(err, ConfigError::InvalidArgument(_)));
    }

    #[rstest]
    #[case::help(["parley", "--help"])]
    #[case::version(["parley", "--version"])]
    fn help_is_not_an_invalid_argument(#[case] args: [&str; 2]) {
        let err = parse_arguments(args).expect_err("help is not a configuration");
        match err {
            ConfigError::HelpRequested(text) => assert!(text.contains("parley")),
            other => panic!("expected help text, got {other:?}"),
        }
    }

    #[test]
    fn metrics_addr_is_carried_over() {
        let config = parse_arguments(["parley", "--metrics-addr", "127.0.0.1:9100"])
            .expect("valid");
        assert_eq!(
            config.metrics_addr(),
            Some(SocketAddr::from((Ipv4Addr::LOCALHOST, 9100)))
        );
    }

    #[test]
    fn zero_read_timeout_is_invalid() {
        let err = parse_arguments(["parley", "--read-timeout-ms", "0"])
            .expect_err("zero timeout should be rejected");
        assert!(matches!(err, ConfigError::InvalidArgument(_)));
    }

    #[test]
    fn read_timeout_is_carried_over() {
        let config = parse_arguments(["parley", "--read-timeout-ms", "250"]).expect("valid");
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
    }

    #[rstest]
    #[case(0, MIN_FRAME_LENGTH)]
    #[case(usize::MAX, MAX_FRAME_LENGTH)]
    #[case(4096, 4096)]
    fn frame_length_is_clamped(#[case] requested: usize, #[case] expected: usize) {
        let config = ServerConfig::default().with_max_frame_length(requested);
        assert_eq!(config.max_frame_length(), expected);
    }

    #[rstest]
    #[case("8083", Some(8083))]
    #[case("http", Some(80))]
    #[case("HTTPS", Some(443))]
    #[case("gopher", None)]
    fn resolves_ports(#[case] token: &str, #[case] expected: Option<u16>) {
        assert_eq!(resolve_port(token), expected);
    }

    #[rstest]
    #[case::numeric("9000", 9000)]
    #[case::service("echo", 7)]
    #[case::service_any_case("Http-Alt", 8080)]
    fn socket_addr_joins_host_and_port(#[case] port: &str, #[case] expected: u16) {
        let config = ServerConfig::new(port)
            .expect("plausible port")
            .with_host(Ipv4Addr::LOCALHOST.into());
        assert_eq!(
            config.socket_addr().expect("resolvable port"),
            SocketAddr::from((Ipv4Addr::LOCALHOST, expected))
        );
    }

    #[test]
    fn socket_addr_reports_unknown_service() {
        let config = ServerConfig::new("gopher").expect("plausible port");
        let err = config.socket_addr().expect_err("unknown service");
        assert!(
            matches!(&err, ServerError::Resolve { service } if service == "gopher"),
            "unexpected error: {err}"
        );
    }
}
