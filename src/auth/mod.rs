//! Authentication state
//!
//! Token records, the revocation list and post-signature verification.

pub mod revocation;
pub mod token;
pub mod verify;

pub use revocation::{RevocationList, MIN_MARKER_TTL, REVOCATION_MARGIN};
pub use token::{AccessTokenRecord, InMemoryTokenStore, TokenKind, TokenStore};
pub use verify::{
    extract_bearer_token, require_bearer_token, AccessToken, AccountType, Authenticator,
    TokenClaims,
};
