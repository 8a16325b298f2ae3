use crate::cache::CompilationCache;
use crate::core::interfaces::*;
use crate::core::models::BuildOptions;
use crate::core::plugin::{Plugin, PluginManager};
use crate::core::registry::ExtensionRegistry;
use crate::infrastructure::{
    ConfigSeedDiscovery, DependencyMapper, JsCodeGenerator, RequireBundleConstructor,
    SetBundleSplitter, TokioFileSystemService,
};
use crate::utils::Result;
use std::fmt;
use std::sync::Arc;

/// Plain helpers used by the pipeline's default bodies.
///
/// Calls through these never consult the extension registry.
#[derive(Clone)]
pub struct Collaborators {
    pub seeds: Arc<dyn SeedDiscovery>,
    pub mapper: Arc<dyn ModuleMapper>,
    pub splitter: Arc<dyn BundleSplitter>,
    pub constructor: Arc<dyn BundleConstructor>,
    pub codegen: Arc<dyn CodeGenerator>,
    pub fs: Arc<dyn FileSystemService>,
}

impl Default for Collaborators {
    fn default() -> Self {
        let fs: Arc<dyn FileSystemService> = Arc::new(TokioFileSystemService);
        Self {
            seeds: Arc::new(ConfigSeedDiscovery::new()),
            mapper: Arc::new(DependencyMapper::new(fs.clone())),
            splitter: Arc::new(SetBundleSplitter::new()),
            constructor: Arc::new(RequireBundleConstructor::new()),
            codegen: Arc::new(JsCodeGenerator::new()),
            fs,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Session-wide state for one build or watch session.
///
/// Read-only once bootstrapped; clones share everything.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    pub opts: Arc<BuildOptions>,
    pub cache: Arc<CompilationCache>,
    pub registry: Arc<ExtensionRegistry>,
    pub collaborators: Collaborators,
}

/// Build a compilation context.
///
/// Built-in plugins named in `opts.plugins` register first, followed by
/// `plugins` in order. Options are not validated here; bad values surface
/// in the stage that first reads them.
pub fn bootstrap_compilation(
    opts: Arc<BuildOptions>,
    cache: Arc<CompilationCache>,
    plugins: &[Arc<dyn Plugin>],
    collaborators: Collaborators,
) -> Result<CompilationContext> {
    let mut manager = PluginManager::from_specs(&opts.plugins);
    for plugin in plugins {
        manager.register(plugin.clone());
    }

    let mut registry = ExtensionRegistry::new();
    manager.populate(&mut registry)?;

    Ok(CompilationContext {
        opts,
        cache,
        registry: Arc::new(registry),
        collaborators,
    })
}
