//! Book catalogue application: user accounts, session tokens and the book
//! resource, assembled from the `shelf-*` crates.

use std::sync::Arc;

use anyhow::Context;
use shelf_db::Database;
use shelf_kernel::{settings::Settings, ModuleRegistry};

pub mod context;
pub mod modules;
pub mod utils;

pub use context::AppContext;

/// Build the services, register every module and bring the schema up to date.
pub fn build_registry(settings: &Settings, db: Arc<Database>) -> anyhow::Result<ModuleRegistry> {
    let ctx = AppContext::from_settings(settings, Arc::clone(&db))?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &ctx)?;
    registry.migrate(&db).context("database migration failed")?;

    Ok(registry)
}
