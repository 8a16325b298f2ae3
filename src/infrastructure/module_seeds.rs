use crate::core::interfaces::SeedDiscovery;
use crate::core::models::{BuildOptions, ModuleSeed, ModuleSeeds, SeedKind};
use crate::infrastructure::ns_path;
use crate::utils::{InterlockError, Logger, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Seeds come straight from the `entry` and `split` options
pub struct ConfigSeedDiscovery;

impl ConfigSeedDiscovery {
    pub fn new() -> Self {
        Self
    }

    async fn locate(src_root: &Path, specifier: &str) -> Result<PathBuf> {
        tokio::fs::canonicalize(src_root.join(specifier))
            .await
            .map_err(|_| InterlockError::Resolve {
                specifier: specifier.to_string(),
                importer: src_root.to_path_buf(),
            })
    }
}

impl Default for ConfigSeedDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeedDiscovery for ConfigSeedDiscovery {
    async fn discover(&self, opts: &BuildOptions) -> Result<ModuleSeeds> {
        let src_root = tokio::fs::canonicalize(&opts.src_root).await.map_err(|e| {
            InterlockError::config(format!("srcRoot {} is not accessible: {}", opts.src_root.display(), e))
        })?;

        let mut seeds = ModuleSeeds::new();

        for (specifier, dest) in &opts.entry {
            let path = Self::locate(&src_root, specifier).await?;
            let key = ns_path(&src_root, &path);
            seeds.insert(
                key.clone(),
                ModuleSeed {
                    key,
                    path,
                    kind: SeedKind::Entry { dest: dest.dest().to_string() },
                },
            );
        }

        for (specifier, dest) in &opts.split {
            let path = Self::locate(&src_root, specifier).await?;
            let key = ns_path(&src_root, &path);
            if seeds.contains_key(&key) {
                Logger::warn(&format!("{} is both an entry and a split point; keeping the entry", key));
                continue;
            }
            seeds.insert(
                key.clone(),
                ModuleSeed {
                    key,
                    path,
                    kind: SeedKind::Split { dest: dest.clone() },
                },
            );
        }

        Ok(seeds)
    }
}
