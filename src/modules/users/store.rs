use std::sync::Arc;

use rusqlite::{params, OptionalExtension, Row};
use serde_json::json;
use shelf_authz::{AuthError, Identity, PasswordHasher, MAX_PASSWORD_BYTES};
use shelf_db::{Database, DbError, Timestamp};
use shelf_http::AppError;
use thiserror::Error;

use super::models::User;

/// Shown for both unknown emails and wrong passwords.
pub const INVALID_LOGIN_MESSAGE: &str = "invalid email or password";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("storage failure: {0}")]
    Storage(#[from] DbError),
}

impl From<rusqlite::Error> for CredentialError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Validation { field, message } => AppError::invalid_field(field, message),
            CredentialError::DuplicateEmail => AppError::conflict(
                vec![json!({ "field": "email", "error": "already registered" })],
                "email is already registered",
            ),
            // Unknown account and wrong password must look identical.
            CredentialError::NotFound | CredentialError::InvalidCredentials => {
                AppError::unauthorized(INVALID_LOGIN_MESSAGE)
            }
            CredentialError::Auth(e) => e.into(),
            CredentialError::Storage(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

/// Owns user rows: registration and password authentication.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
    hasher: PasswordHasher,
    /// Verified against when the email is unknown so both login failures
    /// cost one bcrypt run.
    dummy_digest: Arc<str>,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>, hasher: PasswordHasher) -> Result<Self, AuthError> {
        let dummy_digest = hasher.hash("shelf-dummy-password")?.into();
        Ok(Self {
            db,
            hasher,
            dummy_digest,
        })
    }

    /// Create an account. Uniqueness of the email is enforced by the storage
    /// index, so concurrent registrations of one address cannot both succeed.
    pub fn register(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        validate_email(email)?;
        validate_password(password)?;

        let password_hash = self.hasher.hash(password)?;
        let now = Timestamp::now();

        let inserted = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![email, password_hash, now],
            )
            .map(|_| conn.last_insert_rowid())
        });

        let id = match inserted.map_err(DbError::from) {
            Ok(id) => id,
            Err(e) if e.is_unique_violation() => {
                tracing::info!("registration rejected: email already registered");
                return Err(CredentialError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = id, "user registered");

        Ok(User {
            id,
            email: email.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Check an email/password pair. Email matching is exact and
    /// case-sensitive; soft-deleted accounts are treated as absent.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Identity, CredentialError> {
        let row: Option<(i64, String)> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, password_hash FROM users WHERE email = ?1 AND deleted_at IS NULL",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })?;

        match row {
            Some((user_id, digest)) => {
                if self.hasher.verify(&digest, password) {
                    tracing::info!(user_id, "login succeeded");
                    Ok(Identity { user_id })
                } else {
                    tracing::info!(user_id, "login rejected: wrong password");
                    Err(CredentialError::InvalidCredentials)
                }
            }
            None => {
                let _ = self.hasher.verify(&self.dummy_digest, password);
                tracing::info!("login rejected: unknown email");
                Err(CredentialError::NotFound)
            }
        }
    }

    pub fn find_by_id(&self, id: i64) -> Result<User, CredentialError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT id, email, password_hash, created_at, updated_at, deleted_at
                     FROM users WHERE id = ?1 AND deleted_at IS NULL",
                    params![id],
                    map_user,
                )
                .optional()
            })?
            .ok_or(CredentialError::NotFound)
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        deleted_at: row.get(5)?,
    })
}

fn validate_email(email: &str) -> Result<(), CredentialError> {
    let invalid = |message| CredentialError::Validation {
        field: "email",
        message,
    };
    if email.trim().is_empty() {
        return Err(invalid("email must not be empty"));
    }
    if !email.contains('@') {
        return Err(invalid("email must contain '@'"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), CredentialError> {
    let invalid = |message| CredentialError::Validation {
        field: "password",
        message,
    };
    if password.is_empty() {
        return Err(invalid("password must not be empty"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(invalid("password must be at most 72 bytes"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> CredentialStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let migrations: Vec<_> = crate::modules::users::migrations()
            .into_iter()
            .map(|m| ("users".to_string(), m))
            .collect();
        db.apply_migrations(&migrations).unwrap();
        CredentialStore::new(db, PasswordHasher::new(4).unwrap()).unwrap()
    }

    #[test]
    fn register_and_authenticate() {
        let store = test_store();

        let user = store.register("a@x.com", "s3cret").unwrap();
        assert!(user.id > 0);
        assert_ne!(user.password_hash, "s3cret");

        let identity = store.authenticate("a@x.com", "s3cret").unwrap();
        assert_eq!(identity.user_id, user.id);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = test_store();

        store.register("a@x.com", "first").unwrap();
        assert!(matches!(
            store.register("a@x.com", "second"),
            Err(CredentialError::DuplicateEmail)
        ));
    }

    #[test]
    fn email_is_case_sensitive() {
        let store = test_store();

        store.register("a@x.com", "pw").unwrap();
        store.register("A@x.com", "pw").unwrap();

        assert!(matches!(
            store.authenticate("A@X.COM", "pw"),
            Err(CredentialError::NotFound)
        ));
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let store = test_store();
        store.register("a@x.com", "right").unwrap();

        assert!(matches!(
            store.authenticate("a@x.com", "wrong"),
            Err(CredentialError::InvalidCredentials)
        ));
    }

    #[test]
    fn unknown_email_is_not_found() {
        let store = test_store();
        assert!(matches!(
            store.authenticate("ghost@x.com", "pw"),
            Err(CredentialError::NotFound)
        ));
    }

    #[test]
    fn login_failures_share_one_response() {
        let not_found = AppError::from(CredentialError::NotFound);
        let mismatch = AppError::from(CredentialError::InvalidCredentials);

        assert_eq!(not_found.status(), mismatch.status());
        assert_eq!(not_found.to_string(), mismatch.to_string());
    }

    #[test]
    fn soft_deleted_user_cannot_log_in_and_email_frees_up() {
        let store = test_store();
        let user = store.register("a@x.com", "pw").unwrap();

        store
            .db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET deleted_at = ?1 WHERE id = ?2",
                    params![Timestamp::now(), user.id],
                )
            })
            .unwrap();

        assert!(matches!(
            store.authenticate("a@x.com", "pw"),
            Err(CredentialError::NotFound)
        ));
        assert!(matches!(store.find_by_id(user.id), Err(CredentialError::NotFound)));
        assert!(store.register("a@x.com", "pw").is_ok());
    }

    #[test]
    fn empty_inputs_are_validation_errors() {
        let store = test_store();

        assert!(matches!(
            store.register("", "pw"),
            Err(CredentialError::Validation { field: "email", .. })
        ));
        assert!(matches!(
            store.register("   ", "pw"),
            Err(CredentialError::Validation { field: "email", .. })
        ));
        assert!(matches!(
            store.register("a@x.com", ""),
            Err(CredentialError::Validation { field: "password", .. })
        ));
    }

    #[test]
    fn overlong_password_is_rejected() {
        let store = test_store();
        let long = "p".repeat(MAX_PASSWORD_BYTES + 1);

        assert!(matches!(
            store.register("a@x.com", &long),
            Err(CredentialError::Validation { field: "password", .. })
        ));
    }

    #[test]
    fn find_by_id_returns_registered_user() {
        let store = test_store();
        let user = store.register("a@x.com", "pw").unwrap();

        let found = store.find_by_id(user.id).unwrap();
        assert_eq!(found.email, "a@x.com");
        assert_eq!(found.created_at, user.created_at);
    }
}
