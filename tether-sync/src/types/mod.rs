//! Built-in sync types.

pub mod accessrules;
pub mod endpoints;
pub mod eventhandlers;
pub mod files;
pub mod modules;
pub mod resources;
pub mod script;

use tether_core::RegistryError;

use crate::syncable::HandlerRegistry;

pub use accessrules::AccessRules;
pub use endpoints::Endpoints;
pub use eventhandlers::EventHandlers;
pub use files::StaticFiles;
pub use modules::Modules;
pub use resources::Resources;

/// Registry holding every built-in type, in CLI display order.
pub fn builtin_registry() -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new();
    registry.register(
        "endpoints",
        Box::new(Endpoints::default()),
        'a',
        "HTTP endpoints (routes/*.lua)",
        true,
    )?;
    registry.register(
        "eventhandlers",
        Box::new(EventHandlers::default()),
        'e',
        "Service event handlers (services/*.lua)",
        true,
    )?;
    registry.register(
        "modules",
        Box::new(Modules),
        'm',
        "Shared Lua modules (modules/*.lua)",
        true,
    )?;
    registry.register(
        "files",
        Box::new(StaticFiles),
        's',
        "Static files (files/*)",
        true,
    )?;
    registry.register(
        "resources",
        Box::new(Resources),
        'r',
        "Device resource specs (specs/resources.yaml)",
        false,
    )?;
    registry.register(
        "accessrules",
        Box::new(AccessRules),
        'c',
        "Access-control rules (specs/rules.yaml)",
        false,
    )?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncable::Syncable;
    use tether_core::Selection;

    #[test]
    fn builtins_register_in_order() {
        let registry = builtin_registry().expect("registry");
        let names: Vec<_> = registry.each().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["endpoints", "eventhandlers", "modules", "files", "resources", "accessrules"]
        );
        for entry in registry.each() {
            assert_eq!(entry.handler.name(), entry.name);
        }
    }

    #[test]
    fn default_selection_skips_spec_types() {
        let registry = builtin_registry().unwrap();
        let names: Vec<_> = registry
            .each_filtered(&Selection::default())
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, ["endpoints", "eventhandlers", "modules", "files"]);
        assert_eq!(registry.by_selector('r').unwrap().name, "resources");
    }
}
