//! Filter-function plugins: external modules that add callable functions
//! to the filter language at startup.
//!
//! The registry is an owned object with an explicit startup phase, not a
//! process global. Registration is only possible before [`PluginRegistry::
//! init_all`] runs; after that the plugin list is read-only for the rest
//! of the process lifetime.

use crate::functions::FunctionRegistry;
use crate::{FilterError, Result};
use log::warn;

/// One plugin: an init entry point that registers functions, and a
/// cleanup entry point that releases whatever init acquired.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub init: fn(&mut FunctionRegistry) -> Result<()>,
    pub cleanup: fn(),
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Startup-phase list of plugins. `register` then `init_all` once, in that
/// order; `cleanup_all` at shutdown.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginDescriptor>,
    /// Names of plugins whose init succeeded, in init order.
    active: Vec<&'static str>,
    initialized: bool,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Only valid during the startup phase.
    pub fn register(&mut self, plugin: PluginDescriptor) -> Result<()> {
        if self.initialized {
            return Err(FilterError::Plugin {
                name: plugin.name.to_string(),
                message: "plugin registered after initialization".into(),
            });
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Run every plugin's init in registration order. A failing plugin is
    /// dropped with a warning; it never blocks the others or the engine.
    /// Returns the number of plugins that initialized successfully.
    pub fn init_all(&mut self, functions: &mut FunctionRegistry) -> usize {
        self.initialized = true;
        for plugin in &self.plugins {
            match (plugin.init)(functions) {
                Ok(()) => self.active.push(plugin.name),
                Err(e) => warn!("filter plugin '{}' failed to initialize: {}", plugin.name, e),
            }
        }
        self.active.len()
    }

    /// Run cleanups of successfully initialized plugins, in reverse init
    /// order.
    pub fn cleanup_all(&mut self) {
        for name in self.active.drain(..).rev() {
            if let Some(plugin) = self.plugins.iter().find(|p| p.name == name) {
                (plugin.cleanup)();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{FilterFunction, FunctionSignature};
    use crate::types::{FieldValue, ValueKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CLEANUPS: AtomicUsize = AtomicUsize::new(0);

    struct EchoFunction;
    impl FilterFunction for EchoFunction {
        fn call(&self, args: &[&[FieldValue]]) -> Vec<FieldValue> {
            args.first().map_or_else(Vec::new, |v| v.to_vec())
        }
    }

    fn good_init(reg: &mut FunctionRegistry) -> crate::Result<()> {
        reg.register(
            "echo",
            FunctionSignature::fixed(1, ValueKind::Str),
            EchoFunction,
        )
    }

    fn bad_init(_reg: &mut FunctionRegistry) -> crate::Result<()> {
        Err(FilterError::Plugin {
            name: "broken".into(),
            message: "no resources".into(),
        })
    }

    fn count_cleanup() {
        CLEANUPS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_init_registers_functions() {
        let mut plugins = PluginRegistry::new();
        plugins
            .register(PluginDescriptor {
                name: "echo-plugin",
                init: good_init,
                cleanup: count_cleanup,
            })
            .unwrap();
        let mut functions = FunctionRegistry::new();
        assert_eq!(plugins.init_all(&mut functions), 1);
        assert!(functions.resolve("echo").is_some());
    }

    #[test]
    fn test_failing_plugin_does_not_block_others() {
        let mut plugins = PluginRegistry::new();
        plugins
            .register(PluginDescriptor {
                name: "broken",
                init: bad_init,
                cleanup: count_cleanup,
            })
            .unwrap();
        plugins
            .register(PluginDescriptor {
                name: "echo-plugin",
                init: good_init,
                cleanup: count_cleanup,
            })
            .unwrap();
        let mut functions = FunctionRegistry::new();
        assert_eq!(plugins.init_all(&mut functions), 1);
        assert!(functions.resolve("echo").is_some());
    }

    #[test]
    fn test_no_registration_after_init() {
        let mut plugins = PluginRegistry::new();
        let mut functions = FunctionRegistry::new();
        plugins.init_all(&mut functions);
        let err = plugins
            .register(PluginDescriptor {
                name: "late",
                init: good_init,
                cleanup: count_cleanup,
            })
            .unwrap_err();
        assert!(matches!(err, FilterError::Plugin { .. }));
    }

    #[test]
    fn test_cleanup_runs_for_initialized_plugins_only() {
        CLEANUPS.store(0, Ordering::SeqCst);
        let mut plugins = PluginRegistry::new();
        plugins
            .register(PluginDescriptor {
                name: "broken",
                init: bad_init,
                cleanup: count_cleanup,
            })
            .unwrap();
        plugins
            .register(PluginDescriptor {
                name: "echo-plugin",
                init: good_init,
                cleanup: count_cleanup,
            })
            .unwrap();
        let mut functions = FunctionRegistry::new();
        plugins.init_all(&mut functions);
        plugins.cleanup_all();
        assert_eq!(CLEANUPS.load(Ordering::SeqCst), 1);
    }
}
