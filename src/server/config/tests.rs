//! Tests for server configuration utilities.
//!
//! Covers the builder methods on [`Server`] and the binding paths, including
//! the failures surfaced as [`ServerError`].

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    time::Duration,
};

use rstest::rstest;

use super::*;
use crate::{
    codec::{DEFAULT_FRAME_LENGTH, MAX_FRAME_LENGTH, MIN_FRAME_LENGTH},
    config::ServerConfig,
    processor::ActionProcessor,
    server::{
        ServerError,
        test_util::{bind_server, free_listener, processor},
    },
};

fn localhost(port: &str) -> ServerConfig {
    ServerConfig::new(port)
        .expect("valid port")
        .with_host(Ipv4Addr::LOCALHOST.into())
}

#[rstest]
fn new_server_uses_defaults(processor: ActionProcessor) {
    let server = Server::new(processor);
    assert!(server.local_addr().is_none());
    assert_eq!(server.connection_settings(), ConnectionSettings::default());
    assert_eq!(
        server.connection_settings().max_frame_length,
        DEFAULT_FRAME_LENGTH
    );
    assert_eq!(server.backoff_config(), BackoffConfig::default());
}

#[rstest]
#[case(0, MIN_FRAME_LENGTH)]
#[case(1024, 1024)]
#[case(usize::MAX, MAX_FRAME_LENGTH)]
fn max_frame_length_is_clamped(
    processor: ActionProcessor,
    #[case] requested: usize,
    #[case] expected: usize,
) {
    let server = Server::new(processor).max_frame_length(requested);
    assert_eq!(server.connection_settings().max_frame_length, expected);
}

#[rstest]
fn builder_methods_chain(processor: ActionProcessor) {
    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(5),
    };
    let server = Server::new(processor)
        .read_timeout(Duration::from_secs(3))
        .max_frame_length(4096)
        .accept_backoff(backoff);

    let settings = server.connection_settings();
    assert_eq!(settings.read_timeout, Some(Duration::from_secs(3)));
    assert_eq!(settings.max_frame_length, 4096);
    assert_eq!(server.backoff_config(), backoff.normalized());
    assert!(server.backoff_config().initial_delay <= server.backoff_config().max_delay);
}

#[rstest]
#[tokio::test]
async fn bind_existing_listener_keeps_address(
    processor: ActionProcessor,
    free_listener: StdTcpListener,
) {
    let expected = free_listener.local_addr().expect("listener address");
    let server = bind_server(processor, free_listener);
    assert_eq!(server.local_addr(), Some(expected));
}

#[rstest]
#[tokio::test]
async fn bind_applies_config_settings(processor: ActionProcessor) {
    let config = localhost("0")
        .with_max_frame_length(2048)
        .with_read_timeout(Duration::from_millis(250));
    let server = Server::new(processor)
        .max_frame_length(128)
        .bind(&config)
        .expect("bind localhost");

    let addr = server.local_addr().expect("bound address");
    assert!(addr.ip().is_loopback());
    assert_ne!(addr.port(), 0);
    assert_eq!(
        server.connection_settings(),
        ConnectionSettings {
            max_frame_length: 2048,
            read_timeout: Some(Duration::from_millis(250)),
        }
    );
    server.shutdown();
}

#[rstest]
#[tokio::test]
async fn bind_reports_unknown_service(processor: ActionProcessor) {
    let err = Server::new(processor)
        .bind(&localhost("no-such-service"))
        .err()
        .expect("unknown service must fail");
    assert!(
        matches!(&err, ServerError::Resolve { service } if service == "no-such-service"),
        "unexpected error: {err}"
    );
}

#[rstest]
#[tokio::test]
async fn bind_reports_address_in_use(processor: ActionProcessor, free_listener: StdTcpListener) {
    let port = free_listener.local_addr().expect("listener address").port();
    let err = Server::new(processor)
        .bind(&localhost(&port.to_string()))
        .err()
        .expect("occupied port must fail");
    assert!(matches!(err, ServerError::Bind(_)), "unexpected error: {err}");
}

#[rstest]
#[tokio::test]
async fn shutdown_releases_the_port(processor: ActionProcessor) {
    let server = Server::new(processor)
        .bind(&localhost("0"))
        .expect("bind localhost");
    let addr: SocketAddr = server.local_addr().expect("bound address");
    server.shutdown();

    let rebound = Server::new(ActionProcessor)
        .bind(&localhost(&addr.port().to_string()))
        .expect("port is free again after shutdown");
    assert_eq!(rebound.local_addr(), Some(addr));
}
