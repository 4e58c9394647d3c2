//! Request and response values exchanged over a connection.

/// Prefix carried by responses that report a failure.
pub const ERROR_PREFIX: &str = "error: ";

/// A decoded client request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Name of the transformation to apply.
    pub action: String,
    /// Text the transformation is applied to.
    pub message: String,
}

impl Request {
    /// Construct a request from its two fields.
    #[must_use]
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message: message.into(),
        }
    }
}

/// A response written back to the client.
///
/// The protocol has a single response shape; failures are reported as
/// ordinary responses built by [`Response::error`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// Response payload. May be empty.
    pub message: String,
}

impl Response {
    /// Construct a response carrying `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Construct an error-shaped response describing `err`.
    ///
    /// ```
    /// use parley::message::Response;
    ///
    /// let response = Response::error("unknown action: frobnicate");
    /// assert_eq!(response.message, "error: unknown action: frobnicate");
    /// ```
    #[must_use]
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{ERROR_PREFIX}{err}"),
        }
    }
}
