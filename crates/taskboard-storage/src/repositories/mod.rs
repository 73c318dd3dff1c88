//! Repository layer
//!
//! Each repository owns one table family and takes the shared database
//! handle as a constructor argument, so tests can build isolated
//! instances over in-memory databases.

mod client_repository;
mod code_repository;
mod consent_repository;
mod token_repository;

pub use client_repository::{ClientRecord, ClientRepository};
pub use code_repository::{AuthorizationCodeRecord, AuthorizationCodeRepository};
pub use consent_repository::{ConsentRecord, ConsentRepository, WorkspaceConnection};
pub use token_repository::{TokenRecord, TokenRepository, TokenType};

/// UTC timestamp in the canonical storage format.
///
/// The format sorts lexicographically, so string comparison against
/// another timestamp is a correct ordering test.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// A timestamp `seconds` from now, same format as [`now_timestamp`].
pub fn timestamp_in(seconds: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(seconds))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}
