use crate::core::interfaces::BundleSplitter;
use crate::core::models::{Bundle, BuildOptions, Module, ModuleMaps, ModuleSeed, ModuleSeeds};
use crate::utils::{InterlockError, Logger, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Content-derived name for a set of modules, used for `[setHash]`
pub fn set_hash(module_hashes: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for hash in module_hashes {
        hasher.update(hash.as_bytes());
        hasher.update(b",");
    }
    hasher.finalize().to_hex()[..20].to_string()
}

/// Splits modules by the set of seeds that reach them.
///
/// Every seed roots a bundle. A module reached (without passing through
/// another seed) from exactly one root joins that root's bundle; modules
/// reached from several roots are grouped by their root set into implicit
/// bundles.
pub struct SetBundleSplitter;

impl SetBundleSplitter {
    pub fn new() -> Self {
        Self
    }

    fn root_module(seed: &ModuleSeed, maps: &ModuleMaps) -> Result<Arc<Module>> {
        maps.by_path.get(&seed.path).cloned().ok_or_else(|| {
            InterlockError::config(format!("seed {} was not mapped", seed.key))
        })
    }

    /// Label every module with the indices of the roots that reach it
    fn label_modules(roots: &[Arc<Module>], maps: &ModuleMaps) -> HashMap<String, BTreeSet<usize>> {
        let root_hashes: BTreeSet<&str> = roots.iter().map(|m| m.hash.as_str()).collect();
        let mut labels: HashMap<String, BTreeSet<usize>> = HashMap::new();

        for (index, root) in roots.iter().enumerate() {
            let mut queue = VecDeque::from([root.clone()]);
            labels.entry(root.hash.clone()).or_default().insert(index);

            while let Some(module) = queue.pop_front() {
                for dependency in &module.dependencies {
                    if root_hashes.contains(dependency.as_str()) {
                        continue;
                    }
                    let Some(next) = maps.by_hash.get(dependency) else {
                        continue;
                    };
                    if labels.entry(dependency.clone()).or_default().insert(index) {
                        queue.push_back(next.clone());
                    }
                }
            }
        }

        labels
    }
}

impl Default for SetBundleSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(mut modules: Vec<Arc<Module>>) -> (Vec<Arc<Module>>, Vec<String>) {
    modules.sort_by(|a, b| a.ns_path.cmp(&b.ns_path));
    let hashes = modules.iter().map(|m| m.hash.clone()).collect();
    (modules, hashes)
}

impl BundleSplitter for SetBundleSplitter {
    fn split(&self, opts: &BuildOptions, seeds: &ModuleSeeds, maps: &ModuleMaps) -> Result<Vec<Bundle>> {
        let ordered_seeds: Vec<&ModuleSeed> = seeds
            .values()
            .filter(|s| s.is_entry())
            .chain(seeds.values().filter(|s| !s.is_entry()))
            .collect();
        let roots = ordered_seeds
            .iter()
            .map(|seed| Self::root_module(seed, maps))
            .collect::<Result<Vec<_>>>()?;

        let labels = Self::label_modules(&roots, maps);

        let mut owned: Vec<Vec<Arc<Module>>> = vec![Vec::new(); roots.len()];
        let mut shared: BTreeMap<Vec<usize>, Vec<Arc<Module>>> = BTreeMap::new();
        for (hash, label) in &labels {
            let Some(module) = maps.by_hash.get(hash) else {
                continue;
            };
            let label: Vec<usize> = label.iter().copied().collect();
            if let [only] = label.as_slice() {
                owned[*only].push(module.clone());
            } else {
                shared.entry(label).or_default().push(module.clone());
            }
        }

        let mut bundles = Vec::with_capacity(roots.len() + shared.len());
        for ((seed, root), modules) in ordered_seeds.iter().zip(&roots).zip(owned) {
            let (modules, module_hashes) = sorted(modules);
            let is_entry = seed.is_entry();
            bundles.push(Bundle {
                dest: seed.dest().to_string(),
                modules,
                module_hashes,
                is_entry,
                include_runtime: is_entry,
                module: is_entry.then(|| root.clone()),
            });
        }

        for (label, modules) in shared {
            Logger::debug(&format!("Implicit bundle shared by roots {:?}: {} module(s)", label, modules.len()));
            let (modules, module_hashes) = sorted(modules);
            bundles.push(Bundle {
                dest: opts.implicit_bundle_dest.clone(),
                modules,
                module_hashes,
                is_entry: false,
                include_runtime: false,
                module: None,
            });
        }

        Ok(bundles)
    }
}
