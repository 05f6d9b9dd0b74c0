//! Built-in plugins for contract documents.
//!
//! - [`ListPlugin`]: bullet and ordered lists
//! - [`VariablePlugin`]: `<variable id=".." value=".."/>` slots
//! - [`ComputedPlugin`]: `<computed value=".."/>` derived values
//!
//! The clause plugin lives in `cm-clause` together with its resolver.

mod computed;
mod list;
mod variable;

use std::sync::Arc;

use cm_document::Plugin;

pub use computed::{COMPUTED, ComputedPlugin};
pub use list::{LIST, LIST_ITEM, ListPlugin};
pub use variable::{STATE, UNRESOLVED, VARIABLE, VariablePlugin, is_unresolved, unresolved, variable_node};

/// Options for building built-in plugins by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuiltinOptions {
    /// Serialize computed values as `{{value}}`.
    pub computed_raw_value: bool,
}

/// Build a built-in plugin by name.
///
/// Returns `None` for names this crate does not provide.
#[must_use]
pub fn builtin(name: &str, options: &BuiltinOptions) -> Option<Arc<dyn Plugin>> {
    let plugin: Arc<dyn Plugin> = match name {
        LIST => Arc::new(ListPlugin::new()),
        VARIABLE => Arc::new(VariablePlugin::new()),
        COMPUTED => Arc::new(ComputedPlugin::new().raw_value(options.computed_raw_value)),
        _ => return None,
    };
    tracing::debug!(plugin = name, "Created built-in plugin");
    Some(plugin)
}

/// All built-in plugins with default options, in registration order.
#[must_use]
pub fn default_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(ListPlugin::new()),
        Arc::new(VariablePlugin::new()),
        Arc::new(ComputedPlugin::new()),
    ]
}
