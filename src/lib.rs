#![doc(html_root_url = "https://docs.rs/parley/latest")]
//! Public API for the `parley` library.
//!
//! `parley` is a small TCP server that answers exactly one request per
//! connection. A request is a single line holding an action name and a
//! message; the server applies the action to the message, writes one response
//! line and closes the connection.
//!
//! The crate is layered as follows:
//!
//! - [`codec`] frames and parses request and response lines.
//! - [`processor`] maps a [`message::Request`] to a [`message::Response`].
//! - [`server`] owns the listening socket and drives each connection.
//! - [`config`] and [`cli`] turn command line arguments into settings.
//!
//! ```
//! use parley::{
//!     codec::{decode_request, encode_response},
//!     processor::{ActionProcessor, Processor},
//! };
//!
//! let request = decode_request(b"upper hello\n").expect("well-formed request");
//! let response = ActionProcessor.process(&request).expect("known action");
//! assert_eq!(&encode_response(&response)[..], b"HELLO\n");
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod message;
pub mod metrics;
pub mod processor;
pub mod server;

pub use codec::{CodecError, FramingError};
pub use config::{ConfigError, ServerConfig};
pub use message::{Request, Response};
pub use processor::{ActionProcessor, ProcessError, Processor};
pub use server::{Server, ServerError};
