//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use rstest::fixture;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

use super::{Bound, ConnectionOutcome, ConnectionSettings, Server, handle_connection};
use crate::processor::{ActionProcessor, Processor};

#[fixture]
pub fn processor() -> ActionProcessor { ActionProcessor }

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

pub fn bind_server<P: Processor>(processor: P, listener: StdTcpListener) -> Server<P, Bound> {
    Server::new(processor)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

/// Drive one connection over an in-memory stream.
///
/// Writes `input`, half-closes the client side, and returns the outcome with
/// everything the server wrote before closing.
pub async fn exchange<P: Processor>(processor: &P, input: &[u8]) -> (ConnectionOutcome, String) {
    let (mut client, server) = duplex(1024);
    client.write_all(input).await.expect("client write");
    client.shutdown().await.expect("client shutdown");

    let outcome = handle_connection(server, None, processor, ConnectionSettings::default()).await;

    let mut reply = String::new();
    client
        .read_to_string(&mut reply)
        .await
        .expect("client read");
    (outcome, reply)
}
