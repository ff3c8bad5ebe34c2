pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::AppContext;
use store::CredentialStore;

/// Accounts module: registration, login and the caller's own profile
pub struct UsersModule {
    state: routes::UsersState,
}

impl UsersModule {
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        let store = CredentialStore::new(Arc::clone(&ctx.db), ctx.hasher)?;
        Ok(Self {
            state: routes::UsersState {
                store,
                gate: ctx.gate.clone(),
            },
        })
    }
}

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                email         TEXT    NOT NULL,
                password_hash TEXT    NOT NULL,
                created_at    INTEGER NOT NULL,
                updated_at    INTEGER NOT NULL,
                deleted_at    INTEGER
            );
            -- One live account per exact email.
            CREATE UNIQUE INDEX users_email_live ON users (email) WHERE deleted_at IS NULL;
            "#,
    }]
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }
}

pub fn create_module(ctx: &AppContext) -> anyhow::Result<Arc<dyn Module>> {
    Ok(Arc::new(UsersModule::new(ctx)?))
}
