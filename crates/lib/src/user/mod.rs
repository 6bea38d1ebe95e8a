//! User store for confvault
//!
//! Provides user records and the credential check that gates every
//! configuration operation. Secrets are stored as Argon2id hashes.

pub mod crypto;
pub mod errors;
mod store;
pub mod types;

pub use errors::UserError;
pub use store::UserStore;
pub use types::User;
