use crate::cache::CompilationCache;
use crate::utils::InterlockError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Destination of an entry module: either a bare path or `{ "dest": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryDest {
    Path(String),
    Descriptor { dest: String },
}

impl EntryDest {
    pub fn dest(&self) -> &str {
        match self {
            EntryDest::Path(dest) => dest,
            EntryDest::Descriptor { dest } => dest,
        }
    }
}

impl From<&str> for EntryDest {
    fn from(dest: &str) -> Self {
        EntryDest::Path(dest.to_string())
    }
}

/// Backend for the module cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheMode {
    Memory,
    #[serde(alias = "localStorage")]
    Disk,
}

/// Built-in plugins that can be named in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum PluginSpec {
    Banner { banner: String },
    Stats {
        #[serde(default)]
        verbose: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    #[serde(default = "default_src_root")]
    pub src_root: PathBuf,
    #[serde(default = "default_dest_root")]
    pub dest_root: PathBuf,
    #[serde(default)]
    pub entry: BTreeMap<String, EntryDest>,
    #[serde(default)]
    pub split: BTreeMap<String, String>,
    #[serde(default = "default_implicit_bundle_dest")]
    pub implicit_bundle_dest: String,
    #[serde(default)]
    pub include_comments: bool,
    #[serde(default)]
    pub source_maps: bool,
    /// Only an explicit `false` selects compact output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_mode: Option<CacheMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
}

fn default_src_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_dest_root() -> PathBuf {
    PathBuf::from("dist")
}

fn default_implicit_bundle_dest() -> String {
    "[setHash].js".to_string()
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            src_root: default_src_root(),
            dest_root: default_dest_root(),
            entry: BTreeMap::new(),
            split: BTreeMap::new(),
            implicit_bundle_dest: default_implicit_bundle_dest(),
            include_comments: false,
            source_maps: false,
            pretty: None,
            cache_mode: None,
            cache_dir: None,
            plugins: Vec::new(),
        }
    }
}

impl BuildOptions {
    pub fn is_compact(&self) -> bool {
        self.pretty == Some(false)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.src_root.join(".interlock-cache"))
    }
}

/// Why a seed exists: it is either an entry point or an explicit split point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedKind {
    Entry { dest: String },
    Split { dest: String },
}

/// Starting point for dependency discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSeed {
    /// Path relative to the source root; also the key in [`ModuleSeeds`].
    pub key: String,
    pub path: PathBuf,
    pub kind: SeedKind,
}

impl ModuleSeed {
    pub fn is_entry(&self) -> bool {
        matches!(self.kind, SeedKind::Entry { .. })
    }

    pub fn dest(&self) -> &str {
        match &self.kind {
            SeedKind::Entry { dest } | SeedKind::Split { dest } => dest,
        }
    }
}

pub type ModuleSeeds = BTreeMap<String, ModuleSeed>;

/// A resolved module, ready to be placed into a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub path: PathBuf,
    pub ns_path: String,
    pub hash: String,
    pub raw_source: String,
    /// Hashes of direct dependencies, in source order.
    pub dependencies: Vec<String>,
    /// Maps each `require` specifier found in the source to a module hash.
    pub specifiers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleMaps {
    pub by_hash: BTreeMap<String, Arc<Module>>,
    pub by_path: BTreeMap<PathBuf, Arc<Module>>,
}

impl ModuleMaps {
    pub fn insert(&mut self, module: Arc<Module>) {
        self.by_path.insert(module.path.clone(), module.clone());
        self.by_hash.insert(module.hash.clone(), module);
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// One output unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    pub dest: String,
    pub modules: Vec<Arc<Module>>,
    pub module_hashes: Vec<String>,
    pub is_entry: bool,
    pub include_runtime: bool,
    /// Entry module, set for entry bundles only.
    pub module: Option<Arc<Module>>,
}

/// Module hash → destination of the bundle that owns it
pub type Urls = BTreeMap<String, String>;

/// Input to bundle construction
#[derive(Debug, Clone, Default)]
pub struct BundleInput {
    pub modules: Vec<Arc<Module>>,
    pub include_runtime: bool,
    pub urls: Option<Arc<Urls>>,
    pub entry_module_hash: Option<String>,
}

/// Syntax-level representation of one bundle, handed to code generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleAst {
    pub include_runtime: bool,
    pub urls: Option<Urls>,
    pub entry_module_hash: Option<String>,
    pub modules: Vec<ModuleDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDefinition {
    pub hash: String,
    pub ns_path: String,
    pub dependencies: Vec<String>,
    /// Module source with `require` specifiers rewritten to module hashes.
    pub body: String,
    pub original_source: String,
}

/// Formatting switches passed to code generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodegenOptions {
    pub compact: bool,
    pub include_comments: bool,
    pub source_maps: bool,
}

impl From<&BuildOptions> for CodegenOptions {
    fn from(opts: &BuildOptions) -> Self {
        Self {
            compact: opts.is_compact(),
            include_comments: opts.include_comments,
            source_maps: opts.source_maps,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub map: Option<String>,
}

/// A file produced by a compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmittedArtifact {
    Bundle { bundle: Arc<Bundle>, raw: String },
    SourceMap { dest: String, raw: String },
}

impl EmittedArtifact {
    pub fn dest(&self) -> &str {
        match self {
            EmittedArtifact::Bundle { bundle, .. } => &bundle.dest,
            EmittedArtifact::SourceMap { dest, .. } => dest,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            EmittedArtifact::Bundle { raw, .. } | EmittedArtifact::SourceMap { raw, .. } => raw,
        }
    }

    pub fn bundle(&self) -> Option<&Arc<Bundle>> {
        match self {
            EmittedArtifact::Bundle { bundle, .. } => Some(bundle),
            EmittedArtifact::SourceMap { .. } => None,
        }
    }
}

/// Result of one full compile
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub bundles: BTreeMap<String, EmittedArtifact>,
    pub opts: Arc<BuildOptions>,
    pub cache: Arc<CompilationCache>,
}

impl Compilation {
    /// Every module emitted by this compilation whose path is in `paths`.
    pub fn modules_at(&self, paths: &[PathBuf]) -> Vec<Arc<Module>> {
        let mut found: BTreeMap<PathBuf, Arc<Module>> = BTreeMap::new();
        for bundle in self.bundles.values().filter_map(EmittedArtifact::bundle) {
            for module in &bundle.modules {
                if paths.iter().any(|p| p == &module.path) {
                    found.entry(module.path.clone()).or_insert_with(|| module.clone());
                }
            }
        }
        found.into_values().collect()
    }
}

/// Emitted by the watch layer. Consumers check each field independently.
#[derive(Debug, Clone, Default)]
pub struct BuildEvent {
    pub patch_modules: Option<Vec<Arc<Module>>>,
    pub compilation: Option<Arc<Compilation>>,
    pub error: Option<Arc<InterlockError>>,
}

impl BuildEvent {
    pub fn patch(modules: Vec<Arc<Module>>) -> Self {
        Self {
            patch_modules: Some(modules),
            ..Default::default()
        }
    }

    pub fn compiled(compilation: Arc<Compilation>) -> Self {
        Self {
            compilation: Some(compilation),
            ..Default::default()
        }
    }

    pub fn failed(error: InterlockError) -> Self {
        Self {
            error: Some(Arc::new(error)),
            ..Default::default()
        }
    }
}
