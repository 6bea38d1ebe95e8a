//!
//! confvault: per-user configuration artifact storage.
//!
//! ## Core Concepts
//!
//! * **Artifacts (`store::ConfigArtifact`)**: named, typed binary blobs owned by exactly one
//!   user and keyed by `(owner, filename)`.
//! * **ConfigStore (`store::ConfigStore`)**: the backend-agnostic facade for adding, updating,
//!   deleting and reading artifacts. It enforces key validation and the uniqueness contract.
//! * **Backends (`backend::ArtifactBackend`)**: the persistence strategy chosen once when the
//!   store is built:
//!     * **ObjectBackend (`backend::ObjectBackend`)**: a chunked binary object store inside the SQL
//!       database, with owner and type kept as object metadata.
//!     * **FileBackend (`backend::FileBackend`)**: plain files under `<root>/<owner>/<filename>`.
//! * **UserStore (`user::UserStore`)**: user records and the credential check that gates every
//!   artifact operation.
//! * **FileType (`file_type::FileType`)**: the closed set of artifact types and the extension
//!   classifier.

pub mod backend;
pub mod clock;
pub mod file_type;
pub mod store;
pub mod user;

pub use backend::sql::SqlDatabase;
pub use clock::{Clock, FixedClock, SystemClock};
pub use file_type::FileType;
pub use store::{ConfigArtifact, ConfigStore};
pub use user::{User, UserStore};

/// Result type used throughout the confvault library.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of every [`Error`].
///
/// Transports map these to protocol status codes; the variants are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The user or artifact does not exist.
    NotFound,
    /// A create collided with an existing user or artifact.
    AlreadyExists,
    /// The requester does not own the artifact.
    Unauthorized,
    /// The supplied secret did not match.
    InvalidCredential,
    /// A user id or filename cannot be used as a key.
    InvalidArgument,
    /// The underlying store failed.
    BackendFailure,
}

/// Common error type for the confvault library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured user store errors
    #[error(transparent)]
    User(user::UserError),

    /// Structured configuration store errors
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured persistence errors
    #[error(transparent)]
    Backend(backend::BackendError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::User(_) => "user",
            Error::Store(_) => "store",
            Error::Backend(_) => "backend",
            Error::Io(_) => "io",
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::User(err) if err.is_not_found() => ErrorKind::NotFound,
            Error::User(err) if err.is_already_exists() => ErrorKind::AlreadyExists,
            Error::User(err) if err.is_invalid_credential() => ErrorKind::InvalidCredential,
            Error::User(err) if err.is_invalid_argument() => ErrorKind::InvalidArgument,
            Error::Store(err) if err.is_not_found() => ErrorKind::NotFound,
            Error::Store(err) if err.is_already_exists() => ErrorKind::AlreadyExists,
            Error::Store(err) if err.is_unauthorized() => ErrorKind::Unauthorized,
            Error::Store(err) if err.is_invalid_key() => ErrorKind::InvalidArgument,
            _ => ErrorKind::BackendFailure,
        }
    }

    /// Check if this error indicates a user or artifact was not found.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this error indicates a duplicate create.
    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    /// Check if this error is an ownership failure.
    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    /// Check if this error is a rejected secret.
    pub fn is_invalid_credential(&self) -> bool {
        self.kind() == ErrorKind::InvalidCredential
    }

    /// Check if this error is a rejected user id or filename.
    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    /// Check if this error came from the underlying store.
    pub fn is_backend_failure(&self) -> bool {
        self.kind() == ErrorKind::BackendFailure
    }

    /// Check if this error indicates corrupted stored data.
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_integrity_error(),
            _ => false,
        }
    }
}
