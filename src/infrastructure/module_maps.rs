use crate::cache::{CompilationCache, ModuleRecord};
use crate::core::interfaces::{FileSystemService, ModuleMapper};
use crate::core::models::{BuildOptions, Module, ModuleMaps, ModuleSeed};
use crate::infrastructure::NodeModuleResolver;
use crate::utils::{InterlockError, Logger, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

// Pre-compiled regex patterns for performance
static REQUIRE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)(^|[^.\w$])require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap()
});

/// Module identity used in output and seed keys: `./` plus the path relative
/// to the source root, always with forward slashes.
pub fn ns_path(src_root: &Path, path: &Path) -> String {
    match path.strip_prefix(src_root) {
        Ok(relative) => {
            let parts: Vec<String> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            format!("./{}", parts.join("/"))
        }
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

/// 20 hex characters of blake3 over the module's identity and source
pub fn module_hash(ns_path: &str, source: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ns_path.as_bytes());
    hasher.update(b"\n");
    hasher.update(source.as_bytes());
    hasher.finalize().to_hex()[..20].to_string()
}

/// CommonJS `require("...")` specifiers in source order
pub fn extract_requires(source: &str) -> Vec<String> {
    REQUIRE_REGEX
        .captures_iter(source)
        .filter_map(|cap| cap.get(2).map(|m| m.as_str().to_string()))
        .collect()
}

/// Replace every known `require` specifier with the target module's hash
pub fn rewrite_requires(source: &str, specifiers: &BTreeMap<String, String>) -> String {
    REQUIRE_REGEX
        .replace_all(source, |cap: &Captures| match specifiers.get(&cap[2]) {
            Some(hash) => format!("{}require(\"{}\")", &cap[1], hash),
            None => cap[0].to_string(),
        })
        .into_owned()
}

/// Breadth-first dependency walk from the seeds
pub struct DependencyMapper {
    fs: Arc<dyn FileSystemService>,
    resolver: NodeModuleResolver,
}

impl DependencyMapper {
    pub fn new(fs: Arc<dyn FileSystemService>) -> Self {
        Self {
            fs,
            resolver: NodeModuleResolver::new(),
        }
    }

    async fn load_record(&self, src_root: &Path, cache: &CompilationCache, path: &Path) -> Result<ModuleRecord> {
        let source = self.fs.read_file(path).await?;
        let content_hash = CompilationCache::content_hash(&source);

        if let Some(record) = cache.get(path, &content_hash) {
            return Ok(record);
        }

        let mut requires = Vec::new();
        for specifier in extract_requires(&source) {
            let resolved = self
                .resolver
                .resolve(&specifier, path, src_root)
                .ok_or_else(|| InterlockError::Resolve {
                    specifier: specifier.clone(),
                    importer: path.to_path_buf(),
                })?;
            requires.push((specifier, resolved));
        }

        let ns = ns_path(src_root, path);
        let record = ModuleRecord {
            path: path.to_path_buf(),
            hash: module_hash(&ns, &source),
            ns_path: ns,
            raw_source: source,
            requires,
        };
        Logger::module_mapped(&record.ns_path, &record.hash);

        cache.insert(content_hash, record.clone())?;
        Ok(record)
    }
}

#[async_trait]
impl ModuleMapper for DependencyMapper {
    async fn map_modules(
        &self,
        opts: &BuildOptions,
        cache: &CompilationCache,
        seeds: &[ModuleSeed],
    ) -> Result<ModuleMaps> {
        let src_root = tokio::fs::canonicalize(&opts.src_root).await?;

        let mut queue: VecDeque<PathBuf> = seeds.iter().map(|s| s.path.clone()).collect();
        let mut visited: HashSet<PathBuf> = queue.iter().cloned().collect();
        let mut records = Vec::new();

        while let Some(path) = queue.pop_front() {
            let record = self.load_record(&src_root, cache, &path).await?;
            for (_, dependency) in &record.requires {
                if visited.insert(dependency.clone()) {
                    queue.push_back(dependency.clone());
                }
            }
            records.push(record);
        }

        let hashes: HashMap<&Path, &str> = records
            .iter()
            .map(|r| (r.path.as_path(), r.hash.as_str()))
            .collect();

        let mut maps = ModuleMaps::default();
        for record in &records {
            let mut dependencies: Vec<String> = Vec::new();
            let mut specifiers = BTreeMap::new();
            for (specifier, dependency) in &record.requires {
                let hash = hashes
                    .get(dependency.as_path())
                    .map(|h| h.to_string())
                    .ok_or_else(|| InterlockError::Resolve {
                        specifier: specifier.clone(),
                        importer: record.path.clone(),
                    })?;
                if !dependencies.contains(&hash) {
                    dependencies.push(hash.clone());
                }
                specifiers.insert(specifier.clone(), hash);
            }

            maps.insert(Arc::new(Module {
                path: record.path.clone(),
                ns_path: record.ns_path.clone(),
                hash: record.hash.clone(),
                raw_source: record.raw_source.clone(),
                dependencies,
                specifiers,
            }));
        }

        Ok(maps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::SeedKind;
    use crate::infrastructure::TokioFileSystemService;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_extract_requires_skips_member_calls() {
        let source = r#"
            var a = require("./a");
            var b = require( './b' );
            loader.require("./not-this");
            myrequire("./nor-this");
        "#;
        assert_eq!(extract_requires(source), vec!["./a", "./b"]);
    }

    #[test]
    fn test_rewrite_requires_uses_hashes() {
        let mut specifiers = BTreeMap::new();
        specifiers.insert("./a".to_string(), "0123abcd".to_string());
        let rewritten = rewrite_requires("var a = require('./a');\nrequire(\"./b\");", &specifiers);
        assert_eq!(rewritten, "var a = require(\"0123abcd\");\nrequire(\"./b\");");
    }

    #[test]
    fn test_ns_path_is_relative_with_forward_slashes() {
        let root = Path::new("/project/src");
        assert_eq!(ns_path(root, Path::new("/project/src/app/a.js")), "./app/a.js");
    }

    #[test]
    fn test_module_hash_depends_on_path_and_source() {
        let h = module_hash("./a.js", "x");
        assert_eq!(h.len(), 20);
        assert_ne!(h, module_hash("./b.js", "x"));
        assert_ne!(h, module_hash("./a.js", "y"));
    }

    fn write_project(root: &Path) {
        fs::create_dir_all(root.join("shared")).unwrap();
        fs::write(root.join("entry.js"), "var lib = require('./shared/lib');\nlib();\n").unwrap();
        fs::write(root.join("shared/lib.js"), "module.exports = require('./util');\n").unwrap();
        fs::write(root.join("shared/util.js"), "module.exports = function () {};\n").unwrap();
    }

    async fn map(root: &Path, cache: &CompilationCache) -> Result<ModuleMaps> {
        let opts = BuildOptions {
            src_root: root.to_path_buf(),
            ..Default::default()
        };
        let entry = root.join("entry.js").canonicalize().unwrap();
        let seeds = vec![ModuleSeed {
            key: "./entry.js".to_string(),
            path: entry,
            kind: SeedKind::Entry { dest: "entry.bundle.js".to_string() },
        }];
        DependencyMapper::new(Arc::new(TokioFileSystemService))
            .map_modules(&opts, cache, &seeds)
            .await
    }

    #[tokio::test]
    async fn test_maps_transitive_dependencies() {
        let dir = tempdir().unwrap();
        write_project(dir.path());
        let cache = CompilationCache::in_memory();

        let maps = map(dir.path(), &cache).await.unwrap();
        assert_eq!(maps.len(), 3);
        assert_eq!(cache.len(), 3);

        let root = dir.path().canonicalize().unwrap();
        let entry = &maps.by_path[&root.join("entry.js")];
        let lib = &maps.by_path[&root.join("shared/lib.js")];
        assert_eq!(entry.ns_path, "./entry.js");
        assert_eq!(entry.dependencies, vec![lib.hash.clone()]);
        assert_eq!(entry.specifiers["./shared/lib"], lib.hash);
    }

    #[tokio::test]
    async fn test_unresolvable_require_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("entry.js"), "require('./ghost');\n").unwrap();

        let err = map(dir.path(), &CompilationCache::in_memory()).await.unwrap_err();
        assert!(matches!(err, InterlockError::Resolve { ref specifier, .. } if specifier == "./ghost"));
    }

    #[tokio::test]
    async fn test_changed_source_changes_hash() {
        let dir = tempdir().unwrap();
        write_project(dir.path());
        let cache = CompilationCache::in_memory();
        let root = dir.path().canonicalize().unwrap();

        let before = map(dir.path(), &cache).await.unwrap();
        fs::write(dir.path().join("shared/util.js"), "module.exports = 2;\n").unwrap();
        let after = map(dir.path(), &cache).await.unwrap();

        let util = root.join("shared/util.js");
        assert_ne!(before.by_path[&util].hash, after.by_path[&util].hash);
        assert_eq!(
            before.by_path[&root.join("entry.js")].hash,
            after.by_path[&root.join("entry.js")].hash
        );
    }
}
