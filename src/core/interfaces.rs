use crate::cache::CompilationCache;
use crate::core::models::*;
use crate::utils::Result;
use async_trait::async_trait;
use std::path::Path;

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
}

/// Turns the configured entries and split points into module seeds
#[async_trait]
pub trait SeedDiscovery: Send + Sync {
    async fn discover(&self, opts: &BuildOptions) -> Result<ModuleSeeds>;
}

/// Walks the dependency graph reachable from a set of seeds
#[async_trait]
pub trait ModuleMapper: Send + Sync {
    async fn map_modules(
        &self,
        opts: &BuildOptions,
        cache: &CompilationCache,
        seeds: &[ModuleSeed],
    ) -> Result<ModuleMaps>;
}

/// Partitions mapped modules into bundles
pub trait BundleSplitter: Send + Sync {
    fn split(&self, opts: &BuildOptions, seeds: &ModuleSeeds, maps: &ModuleMaps) -> Result<Vec<Bundle>>;
}

pub trait BundleConstructor: Send + Sync {
    fn construct(&self, input: &BundleInput) -> Result<BundleAst>;
}

pub trait CodeGenerator: Send + Sync {
    fn generate(&self, ast: &BundleAst, dest: &str, options: &CodegenOptions) -> Result<GeneratedCode>;
}
