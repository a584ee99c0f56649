//! Error types for the public API.
//!
//! Internally we use `anyhow` (`Res<T>`) and attach context as errors bubble up. At the public
//! boundary every error is classified with an `ErrorType` so that callers, such as the wizard or
//! the editor, can react to the kind of failure while still showing the full message to the user.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The result type used inside the crate, before errors are classified.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// The result type returned by public functions.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of failure. This is what callers should `match` on.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// An operation that requires a session was attempted without one.
    MissingSession,
    /// The requested username is already taken.
    DuplicateUsername,
    /// An upload (or other input) was rejected because it is malformed.
    Validation,
    /// A network failure, a timeout, or a non-success response from the backend.
    Transport,
    /// An open edit would be thrown away by the requested operation.
    ConflictDiscarded,
    /// The operation is not valid in the current wizard step or edit state.
    InvalidState,
    /// The configuration could not be created or loaded.
    Config,
    /// A local file could not be read or written.
    Io,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// A classified error. The `Display` implementation renders the whole context chain, which is
/// what gets shown to the user.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    /// Creates a new error of type `error_type` with the given message.
    pub fn new(error_type: ErrorType, message: impl Display) -> Self {
        Self {
            error_type,
            inner: anyhow::anyhow!("{message}"),
        }
    }

    /// Wraps an existing `anyhow::Error`.
    pub fn with_source(error_type: ErrorType, inner: anyhow::Error) -> Self {
        Self { error_type, inner }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// Adds a layer of context while keeping the `ErrorType`.
    pub fn context(self, context: impl Display + Send + Sync + 'static) -> Self {
        Self {
            error_type: self.error_type,
            inner: self.inner.context(context),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Converts internal results into public, classified results.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::with_source(error_type, e))
    }
}
