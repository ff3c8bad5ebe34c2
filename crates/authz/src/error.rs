use shelf_http::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Token missing, malformed, badly signed, expired or using another
    /// algorithm. Deliberately carries no detail.
    #[error("unauthorized")]
    Unauthorized,

    #[error("failed to sign session token")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("password hashing failed")]
    Hashing(#[source] bcrypt::BcryptError),

    #[error("invalid auth configuration: {0}")]
    Config(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => AppError::unauthorized("authentication required"),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}
