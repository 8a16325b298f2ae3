use crate::core::interfaces::BundleConstructor;
use crate::core::models::{BundleAst, BundleInput, ModuleDefinition};
use crate::infrastructure::rewrite_requires;
use crate::utils::Result;

/// Builds the bundle AST, pointing every `require` at a module hash
pub struct RequireBundleConstructor;

impl RequireBundleConstructor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequireBundleConstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleConstructor for RequireBundleConstructor {
    fn construct(&self, input: &BundleInput) -> Result<BundleAst> {
        let modules = input
            .modules
            .iter()
            .map(|module| ModuleDefinition {
                hash: module.hash.clone(),
                ns_path: module.ns_path.clone(),
                dependencies: module.dependencies.clone(),
                body: rewrite_requires(&module.raw_source, &module.specifiers),
                original_source: module.raw_source.clone(),
            })
            .collect();

        Ok(BundleAst {
            include_runtime: input.include_runtime,
            urls: input.urls.as_deref().cloned(),
            entry_module_hash: input.entry_module_hash.clone(),
            modules,
        })
    }
}
