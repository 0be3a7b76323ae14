use thiserror::Error;

use crux_http::HttpError;

/// Raised before any request is issued: the local trip state does not allow
/// the operation yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("no trip selected")]
    NoTripSelected,

    #[error("no registered trip; create a contract first")]
    TripNotRegistered,

    #[error("trip form field '{0}' must not be blank")]
    BlankField(&'static str),
}

/// Failure of a contract API workflow. `Display` is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("could not build request: {0}")]
    InvalidRequest(String),

    /// No response: DNS, refused connection, timeout.
    #[error("{reason}")]
    Transport { reason: String },

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// Non-2xx status; `reason` is the server `detail` or `HTTP {status}`.
    #[error("{reason}")]
    Http { status: u16, reason: String },

    /// 2xx with `success: false`.
    #[error("{message}")]
    Application { message: String },
}

impl ClientError {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Errors raised while building a request, e.g. a body that does not
/// serialize. Errors on the way back are classified by `api::normalize`.
impl From<HttpError> for ClientError {
    fn from(e: HttpError) -> Self {
        ClientError::InvalidRequest(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unknown log policy '{0}' (expected 'append-latest' or 'deduplicate')")]
    UnknownLogPolicy(String),
}

/// The presentation surface could not take the update. Never escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("presentation surface is not mounted")]
    NotMounted,
}
