//! Error types for the user store
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UserError {
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("User already exists: {user_id}")]
    UserAlreadyExists { user_id: String },

    #[error("Invalid credential for user: {user_id}")]
    InvalidCredential { user_id: String },

    #[error("Invalid user id {user_id:?}: {reason}")]
    InvalidUserId { user_id: String, reason: String },

    #[error("Password hashing failed: {reason}")]
    PasswordHashingFailed { reason: String },

    #[error("Stored credential for {user_id} is unreadable")]
    CorruptCredential { user_id: String },
}

impl UserError {
    /// Check if this error indicates the user does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UserError::UserNotFound { .. })
    }

    /// Check if this error indicates a duplicate user id.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, UserError::UserAlreadyExists { .. })
    }

    /// Check if this error is a rejected secret.
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, UserError::InvalidCredential { .. })
    }

    /// Check if this error is a malformed argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, UserError::InvalidUserId { .. })
    }
}

impl From<UserError> for crate::Error {
    fn from(err: UserError) -> Self {
        crate::Error::User(err)
    }
}
