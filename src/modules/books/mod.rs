pub mod models;
pub mod repository;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::AppContext;
use repository::BookRepository;

/// Books module: the protected book resource
pub struct BooksModule {
    state: routes::BooksState,
}

impl BooksModule {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            state: routes::BooksState {
                repo: BookRepository::new(Arc::clone(&ctx.db)),
                gate: ctx.gate.clone(),
            },
        }
    }
}

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE books (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT    NOT NULL,
                author      TEXT    NOT NULL,
                description TEXT    NOT NULL DEFAULT '',
                price       INTEGER NOT NULL CHECK (price >= 0),
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL,
                deleted_at  INTEGER
            );
            CREATE INDEX books_deleted_at ON books (deleted_at);
            CREATE INDEX books_name ON books (name);
            "#,
    }]
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

pub fn create_module(ctx: &AppContext) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(ctx))
}
