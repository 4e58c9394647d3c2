//! Command line interface for the `parley` server binary.
//!
//! The definition is shared with `build.rs`, which renders the manual page,
//! so it must not depend on anything outside `clap` and `std`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

/// Port used when `--port` is not given.
pub const DEFAULT_PORT: &str = "8083";

/// Command line arguments for the `parley` binary.
#[derive(Debug, Parser)]
#[command(
    name = "parley",
    version,
    about = "Line-framed TCP request/response server"
)]
pub struct Cli {
    /// Port number or service name to listen on.
    #[arg(short, long, default_value = DEFAULT_PORT)]
    pub port: String,

    /// Local interface address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Largest request frame accepted, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = 64 * 1024)]
    pub max_frame_length: usize,

    /// Drop clients that have not sent a complete request within this many
    /// milliseconds.
    #[arg(long, value_name = "MS")]
    pub read_timeout_ms: Option<u64>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}
