use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The parts of package.json that take part in entry resolution
#[derive(Debug, Clone, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub browser: Option<BrowserField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BrowserField {
    String(String),
    Object(HashMap<String, serde_json::Value>),
}

const EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "json"];

/// Node.js-style resolution of `require` specifiers
///
/// Every resolved path is canonical, so one file always maps to one module.
pub struct NodeModuleResolver {
    /// Cache of package.json files
    package_cache: DashMap<PathBuf, Option<PackageJson>>,
}

impl NodeModuleResolver {
    pub fn new() -> Self {
        Self {
            package_cache: DashMap::new(),
        }
    }

    /// Resolve `specifier` as required from `from_file`.
    ///
    /// Root-absolute specifiers (`/lib/x`) resolve against `src_root`.
    pub fn resolve(&self, specifier: &str, from_file: &Path, src_root: &Path) -> Option<PathBuf> {
        let resolved = if specifier.starts_with("./") || specifier.starts_with("../") {
            let current_dir = from_file.parent()?;
            self.resolve_file_or_directory(&current_dir.join(specifier))
        } else if let Some(rooted) = specifier.strip_prefix('/') {
            self.resolve_file_or_directory(&src_root.join(rooted))
        } else {
            self.resolve_node_module(specifier, from_file)
        }?;

        resolved.canonicalize().ok()
    }

    /// Walk up from the importer looking for `node_modules/<package>`
    fn resolve_node_module(&self, specifier: &str, from_file: &Path) -> Option<PathBuf> {
        let (pkg_name, subpath) = parse_package_specifier(specifier);

        let mut current_dir = from_file.parent();
        while let Some(dir) = current_dir {
            let package_dir = dir.join("node_modules").join(&pkg_name);
            if package_dir.is_dir() {
                if let Some(entry) = self.resolve_package_entry(&package_dir, subpath.as_deref()) {
                    return Some(entry);
                }
            }
            current_dir = dir.parent();
        }

        None
    }

    fn resolve_package_entry(&self, package_dir: &Path, subpath: Option<&str>) -> Option<PathBuf> {
        if let Some(subpath) = subpath {
            return self.resolve_file_or_directory(&package_dir.join(subpath));
        }

        if let Some(package_json) = self.read_package_json(&package_dir.join("package.json")) {
            let browser = match &package_json.browser {
                Some(BrowserField::String(path)) => Some(path.as_str()),
                _ => None,
            };
            let candidates = [browser, package_json.main.as_deref(), package_json.module.as_deref()];

            for candidate in candidates.into_iter().flatten() {
                if let Some(resolved) = self.resolve_file_or_directory(&package_dir.join(candidate)) {
                    return Some(resolved);
                }
            }
        }

        self.resolve_as_file(&package_dir.join("index"))
    }

    /// Try to resolve as file or directory
    fn resolve_file_or_directory(&self, path: &Path) -> Option<PathBuf> {
        if let Some(file) = self.resolve_as_file(path) {
            return Some(file);
        }

        if !path.is_dir() {
            return None;
        }

        if let Some(pkg) = self.read_package_json(&path.join("package.json")) {
            if let Some(main) = &pkg.main {
                if let Some(resolved) = self.resolve_as_file(&path.join(main)) {
                    return Some(resolved);
                }
            }
        }

        self.resolve_as_file(&path.join("index"))
    }

    /// Try the path as-is, then with each known extension appended
    fn resolve_as_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        EXTENSIONS.iter().find_map(|ext| {
            let mut with_ext = OsString::from(path.as_os_str());
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            with_ext.is_file().then_some(with_ext)
        })
    }

    /// Read and cache package.json
    fn read_package_json(&self, path: &Path) -> Option<PackageJson> {
        if let Some(cached) = self.package_cache.get(path) {
            return cached.clone();
        }

        let package = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<PackageJson>(&content).ok());

        self.package_cache.insert(path.to_path_buf(), package.clone());
        package
    }
}

impl Default for NodeModuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `sub/path`)
fn parse_package_specifier(specifier: &str) -> (String, Option<String>) {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut parts = specifier.splitn(name_segments + 1, '/');
    let name: Vec<&str> = parts.by_ref().take(name_segments).collect();
    let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (name.join("/"), subpath)
}
