use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shelf_kernel::settings::AuthSettings;
use time::{Duration, OffsetDateTime};

use crate::{AuthError, Identity};

/// Wire claims of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Unix timestamp (seconds) after which the token is rejected.
    pub exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

/// Issues and verifies stateless HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Config("token secret must not be empty".into()));
        }
        if ttl <= Duration::ZERO {
            return Err(AuthError::Config("token lifetime must be positive".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is a hard boundary on this host's clock.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
                ttl,
            }),
        })
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let hours = i64::try_from(settings.token_ttl_hours)
            .map_err(|_| AuthError::Config("token lifetime out of range".into()))?;
        Self::new(settings.jwt_secret.as_bytes(), Duration::hours(hours))
    }

    pub fn ttl(&self) -> Duration {
        self.keys.ttl
    }

    /// Sign a token for `user_id` expiring one lifetime from now.
    pub fn issue(&self, user_id: i64) -> Result<String, AuthError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    fn issue_at(&self, user_id: i64, now: OffsetDateTime) -> Result<String, AuthError> {
        let claims = Claims {
            user_id,
            exp: (now + self.keys.ttl).unix_timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(AuthError::Signing)
    }

    /// Every failure collapses to [`AuthError::Unauthorized`].
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.keys.validation).map_err(
            |e| {
                tracing::debug!(reason = ?e.kind(), "session token rejected");
                AuthError::Unauthorized
            },
        )?;

        // The library accepts `exp == now`; a token is only valid strictly before.
        if data.claims.exp <= OffsetDateTime::now_utc().unix_timestamp() {
            tracing::debug!("session token rejected: expired");
            return Err(AuthError::Unauthorized);
        }

        Ok(Identity {
            user_id: data.claims.user_id,
        })
    }
}
