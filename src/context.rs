use std::sync::Arc;

use anyhow::Context;
use shelf_authz::{Gatekeeper, PasswordHasher, TokenService};
use shelf_db::Database;
use shelf_kernel::settings::Settings;

/// Services shared by every module, built once from settings at startup.
#[derive(Clone)]
pub struct AppContext {
    pub db: Arc<Database>,
    pub hasher: PasswordHasher,
    pub gate: Gatekeeper,
}

impl AppContext {
    pub fn from_settings(settings: &Settings, db: Arc<Database>) -> anyhow::Result<Self> {
        let hasher =
            PasswordHasher::new(settings.auth.bcrypt_cost).context("invalid password hashing cost")?;
        let tokens =
            TokenService::from_settings(&settings.auth).context("invalid session token settings")?;

        Ok(Self {
            db,
            hasher,
            gate: Gatekeeper::new(tokens, settings.auth.cookie_name.as_str()),
        })
    }
}
