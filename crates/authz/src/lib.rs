//! Credential hashing, session tokens and request gatekeeping.
//!
//! - [`PasswordHasher`]: salted, cost-tunable bcrypt digests
//! - [`TokenService`]: HS256 session tokens carrying `user_id` and `exp`
//! - [`Gatekeeper`]: pulls a token from the request and attaches the verified
//!   [`Identity`] before protected handlers run

mod error;
mod gatekeeper;
mod password;
mod token;

use serde::Serialize;

pub use error::AuthError;
pub use gatekeeper::{require_identity, Gatekeeper, TokenSource};
pub use password::{PasswordHasher, MAX_PASSWORD_BYTES};
pub use token::{Claims, TokenService};

/// Verified caller identity attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: i64,
}
