//! Error types collected while building and executing a request chain.
//!
//! Nothing in a chain fails eagerly. Every builder method that receives bad input
//! records an [`Error`] and keeps going; the terminal operation refuses to send
//! anything while the list is non-empty and hands the whole list back as
//! [`Errors`].

use http::StatusCode;
use std::fmt;
use std::sync::Arc;

/// A single problem recorded on a chain.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{Agent, Error};
///
/// # async fn example() -> Result<(), chainreq::Errors> {
/// let agent = Agent::new();
///
/// match agent.get("https://api.example.com/items").content_type("bogus").end().await {
///     Ok((response, body)) => println!("{}: {}", response.status, body),
///     Err(errors) => {
///         for error in errors.iter() {
///             if let Error::UnknownType(token) = error {
///                 eprintln!("no such body type: {}", token);
///             }
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// `content_type` was given a token that is not in the type registry.
    #[error("unknown content type \"{0}\"")]
    UnknownType(String),

    /// A query contribution was neither a flat JSON object nor a valid
    /// `key=value&...` string.
    #[error("invalid query \"{input}\": {reason}")]
    InvalidQuery {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// A body contribution was neither JSON nor a valid `key=value&...` string.
    #[error("invalid body \"{input}\": {reason}")]
    InvalidBody {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// A header name or value could not be represented on the wire.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The HTTP method is empty or not a valid token.
    #[error("invalid method \"{0}\"")]
    InvalidMethod(String),

    /// The target URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The proxy URL could not be used.
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),

    /// The chain was configured in a way that cannot be assembled into a request.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A file attachment could not be read from disk.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        /// Path that was being read
        path: String,
        /// Underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A record could not be serialized into a body or query contribution.
    #[error("failed to serialize record: {0}")]
    SerializationFailed(String),

    /// The response body could not be deserialized into the requested type.
    #[error("failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The transport failed (DNS, connection refused, TLS, broken stream...).
    #[error("network error: {0}")]
    Network(#[source] Arc<reqwest::Error>),

    /// The configured timeout elapsed before the exchange completed.
    #[error("request timed out")]
    Timeout,
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input given to the chain. Recorded softly, blocks execution.
    Configuration,
    /// A record or response body could not be (de)serialized.
    Serialization,
    /// The exchange with the server failed. Terminal for that execution.
    Transport,
}

impl Error {
    /// Returns the category this error belongs to.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::{Error, ErrorKind};
    ///
    /// assert_eq!(Error::UnknownType("yaml".into()).kind(), ErrorKind::Configuration);
    /// assert_eq!(Error::Timeout.kind(), ErrorKind::Transport);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownType(_)
            | Error::InvalidQuery { .. }
            | Error::InvalidBody { .. }
            | Error::InvalidHeader(_)
            | Error::InvalidMethod(_)
            | Error::InvalidUrl(_)
            | Error::InvalidProxy(_)
            | Error::ConfigurationError(_)
            | Error::FileRead { .. } => ErrorKind::Configuration,
            Error::SerializationFailed(_) | Error::DeserializationFailed { .. } => {
                ErrorKind::Serialization
            }
            Error::Network(_) | Error::Timeout => ErrorKind::Transport,
        }
    }

    /// Returns `true` for transport failures.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Converts a reqwest error, folding timeouts into [`Error::Timeout`].
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(Arc::new(error))
        }
    }
}

/// The ordered list of errors accumulated by a chain.
///
/// A terminal operation returns this as its `Err` side; it is never empty there.
#[derive(Debug, Clone, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an error.
    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    /// Consumes the list, returning the errors in the order they were recorded.
    pub fn into_vec(self) -> Vec<Error> {
        self.0
    }

    /// Returns `true` if any recorded error has the given kind.
    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|e| e.kind() == kind)
    }
}

impl std::ops::Deref for Errors {
    type Target = [Error];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Self(vec![error])
    }
}

impl From<Vec<Error>> for Errors {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

/// A specialized `Result` type for chain operations.
pub type Result<T> = std::result::Result<T, Error>;
