//! Utilities for exercising a [`parley`] server over real sockets in tests.
//!
//! [`TestServer`] runs a bound [`Server`](parley::Server) on a background
//! task and stops it on demand; the [`client`] helpers speak to it either
//! through the line codec or with raw bytes.
//!
//! ```rust
//! use parley::{ActionProcessor, Request};
//! use parley_testing::{TestServer, client::send_request};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let server = TestServer::start(ActionProcessor).await?;
//! let response = send_request(server.addr(), Request::new("upper", "hi")).await?;
//! assert_eq!(response.message, "HI");
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
mod server;

pub use server::{TestServer, unused_listener};
