pub mod books;
pub mod users;

use shelf_kernel::ModuleRegistry;

use crate::AppContext;

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, ctx: &AppContext) -> anyhow::Result<()> {
    registry.register(users::create_module(ctx)?)?;
    registry.register(books::create_module(ctx))?;
    Ok(())
}
