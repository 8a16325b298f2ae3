// Stats Plugin: Logs output statistics after each compile

use crate::core::models::{Compilation, EmittedArtifact};
use crate::core::plugin::Plugin;
use crate::core::registry::ExtensionRegistry;
use crate::core::services::BuildOutput;
use crate::utils::{Logger, Result};
use futures::FutureExt;

/// Sizes of everything a compilation emitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub bundles: usize,
    pub entry_bundles: usize,
    pub source_maps: usize,
    pub modules: usize,
    pub total_bytes: usize,
}

impl BuildStats {
    pub fn collect(compilation: &Compilation) -> Self {
        let mut stats = Self::default();
        for artifact in compilation.bundles.values() {
            stats.total_bytes += artifact.raw().len();
            match artifact {
                EmittedArtifact::Bundle { bundle, .. } => {
                    stats.bundles += 1;
                    stats.modules += bundle.modules.len();
                    if bundle.is_entry {
                        stats.entry_bundles += 1;
                    }
                }
                EmittedArtifact::SourceMap { .. } => stats.source_maps += 1,
            }
        }
        stats
    }
}

/// Plugin that logs build statistics once output has been assembled
pub struct StatsPlugin {
    verbose: bool,
}

impl StatsPlugin {
    /// `verbose` also lists every artifact with its size
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

fn report(compilation: &Compilation, verbose: bool) {
    let stats = BuildStats::collect(compilation);
    Logger::info("📊 Stats Plugin: Build Statistics");
    Logger::info(&format!(
        "  📦 Bundles: {} ({} entry)",
        stats.bundles, stats.entry_bundles
    ));
    Logger::info(&format!("  🧩 Modules: {}", stats.modules));
    Logger::info(&format!("  🗺️  Source maps: {}", stats.source_maps));
    Logger::info(&format!("  💾 Total size: {} bytes", stats.total_bytes));

    if verbose {
        Logger::info("  📄 Output Files:");
        for (i, (dest, artifact)) in compilation.bundles.iter().enumerate() {
            Logger::info(&format!("     {}. {} ({} bytes)", i + 1, dest, artifact.raw().len()));
        }
    }
}

impl Plugin for StatsPlugin {
    fn name(&self) -> &str {
        "stats-plugin"
    }

    fn register(&self, registry: &mut ExtensionRegistry) -> Result<()> {
        let verbose = self.verbose;
        registry.add_transform::<BuildOutput>(move |_cx, compilation, _bundles| {
            async move {
                report(&compilation, verbose);
                Ok(compilation)
            }
            .boxed()
        })
    }
}
