//! Request processing.
//!
//! A [`Processor`] turns a decoded [`Request`] into a [`Response`]. The
//! bundled [`ActionProcessor`] dispatches on [`Action`], a closed set of text
//! transformations. Processors must be pure: the connection layer relies on
//! being able to call them without coordinating with other connections.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::message::{Request, Response};

/// Errors produced while processing a request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProcessError {
    /// The request named an action the processor does not implement.
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Transforms requests into responses.
///
/// Implementations should not perform I/O or touch shared mutable state; the
/// same request must always produce the same result.
pub trait Processor: Send + Sync + 'static {
    /// Produce the response for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessError`] if the request cannot be served. The
    /// connection layer reports it to the client as an error response.
    fn process(&self, request: &Request) -> Result<Response, ProcessError>;
}

impl<F> Processor for F
where
    F: Fn(&Request) -> Result<Response, ProcessError> + Send + Sync + 'static,
{
    fn process(&self, request: &Request) -> Result<Response, ProcessError> { self(request) }
}

/// Actions understood by [`ActionProcessor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Action {
    /// Return the message unchanged.
    Echo,
    /// Convert the message to uppercase.
    Upper,
    /// Convert the message to lowercase.
    Lower,
    /// Reverse the order of the message's characters.
    Reverse,
    /// Count the message's characters.
    Length,
}

impl Action {
    /// Every action, in protocol order.
    pub const ALL: [Action; 5] = [
        Action::Echo,
        Action::Upper,
        Action::Lower,
        Action::Reverse,
        Action::Length,
    ];

    /// The action's name on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Echo => "echo",
            Action::Upper => "upper",
            Action::Lower => "lower",
            Action::Reverse => "reverse",
            Action::Length => "length",
        }
    }

    /// Apply the transformation to `message`.
    #[must_use]
    pub fn apply(self, message: &str) -> String {
        match self {
            Action::Echo => message.to_owned(),
            Action::Upper => message.to_uppercase(),
            Action::Lower => message.to_lowercase(),
            Action::Reverse => message.chars().rev().collect(),
            Action::Length => message.chars().count().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Action {
    type Err = ProcessError;

    /// Names are matched exactly; `"Echo"` is not `"echo"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ProcessError::UnknownAction(s.to_owned()))
    }
}

/// Default processor dispatching on [`Action`].
///
/// ```
/// use parley::{
///     message::Request,
///     processor::{ActionProcessor, ProcessError, Processor},
/// };
///
/// let response = ActionProcessor
///     .process(&Request::new("upper", "hello"))
///     .expect("known action");
/// assert_eq!(response.message, "HELLO");
///
/// let err = ActionProcessor
///     .process(&Request::new("frobnicate", "hello"))
///     .expect_err("unknown action");
/// assert_eq!(err, ProcessError::UnknownAction("frobnicate".into()));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ActionProcessor;

impl Processor for ActionProcessor {
    fn process(&self, request: &Request) -> Result<Response, ProcessError> {
        let action: Action = request.action.parse()?;
        Ok(Response::new(action.apply(&request.message)))
    }
}
