// Plugin system for Interlock
// A plugin is a named bundle of overrides and transforms

use crate::core::models::PluginSpec;
use crate::core::registry::ExtensionRegistry;
use crate::plugins::{BannerPlugin, StatsPlugin};
use crate::utils::{Logger, Result};
use std::sync::Arc;

/// Main plugin trait that all plugins must implement
///
/// A plugin contributes to the build by registering overrides and
/// transforms for extension points:
/// - overrides replace a step's behavior, or decline with `Handled::Continue`
/// - transforms post-process a step's result
pub trait Plugin: Send + Sync {
    /// Unique name for this plugin
    fn name(&self) -> &str;

    /// Register this plugin's extensions.
    ///
    /// Called once per compilation context, in plugin order. Registrations
    /// from earlier plugins run first.
    fn register(&self, registry: &mut ExtensionRegistry) -> Result<()>;
}

/// Manages plugin registration
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    /// Create a new empty plugin manager
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Instantiate the built-in plugins named in the configuration
    pub fn from_specs(specs: &[PluginSpec]) -> Self {
        let mut manager = Self::new();
        for spec in specs {
            let plugin: Arc<dyn Plugin> = match spec {
                PluginSpec::Banner { banner } => Arc::new(BannerPlugin::new(banner.clone())),
                PluginSpec::Stats { verbose } => Arc::new(StatsPlugin::new(*verbose)),
            };
            manager.register(plugin);
        }
        manager
    }

    /// Register a plugin
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Get number of registered plugins
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Let every plugin register its extensions, in registration order
    pub fn populate(&self, registry: &mut ExtensionRegistry) -> Result<()> {
        for plugin in &self.plugins {
            Logger::debug(&format!("Registering plugin: {}", plugin.name()));
            plugin.register(registry)?;
        }
        Ok(())
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
