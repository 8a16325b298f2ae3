use crate::core::models::{BuildOptions, CacheMode};
use crate::utils::{InterlockError, Logger, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// What the module mapper learns from reading one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub path: PathBuf,
    pub ns_path: String,
    pub hash: String,
    pub raw_source: String,
    /// `require` specifiers in source order, with the file each resolved to.
    pub requires: Vec<(String, PathBuf)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    content_hash: String,
    record: ModuleRecord,
}

/// Module memo shared by every compile of a session.
///
/// Entries are keyed by absolute path and only returned while the file's
/// content hash still matches. With a cache directory, entries are also
/// persisted with bincode and loaded on a memory miss.
pub struct CompilationCache {
    memory_cache: DashMap<PathBuf, CacheEntry>,
    cache_dir: Option<PathBuf>,
}

impl CompilationCache {
    pub fn in_memory() -> Self {
        Self {
            memory_cache: DashMap::new(),
            cache_dir: None,
        }
    }

    pub fn persistent(cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir)?;

        Ok(Self {
            memory_cache: DashMap::new(),
            cache_dir: Some(cache_dir.to_path_buf()),
        })
    }

    pub fn from_options(opts: &BuildOptions) -> Result<Self> {
        match opts.cache_mode {
            Some(CacheMode::Disk) => Self::persistent(&opts.cache_dir()),
            Some(CacheMode::Memory) | None => Ok(Self::in_memory()),
        }
    }

    pub fn content_hash(source: &str) -> String {
        blake3::hash(source.as_bytes()).to_hex().to_string()
    }

    pub fn is_persistent(&self) -> bool {
        self.cache_dir.is_some()
    }

    pub fn get(&self, path: &Path, content_hash: &str) -> Option<ModuleRecord> {
        if let Some(entry) = self.memory_cache.get(path) {
            if entry.content_hash == content_hash {
                return Some(entry.record.clone());
            }
        }

        let entry = self.load_from_disk(path)?;
        if entry.content_hash != content_hash {
            return None;
        }
        let record = entry.record.clone();
        self.memory_cache.insert(path.to_path_buf(), entry);
        Some(record)
    }

    pub fn insert(&self, content_hash: String, record: ModuleRecord) -> Result<()> {
        let entry = CacheEntry {
            content_hash,
            record,
        };
        self.save_to_disk(&entry)?;
        self.memory_cache.insert(entry.record.path.clone(), entry);
        Ok(())
    }

    pub fn invalidate(&self, path: &Path) {
        self.memory_cache.remove(path);
        if let Some(cache_path) = self.get_cache_path(path) {
            let _ = fs::remove_file(cache_path);
        }
    }

    pub fn len(&self) -> usize {
        self.memory_cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory_cache.is_empty()
    }

    fn load_from_disk(&self, path: &Path) -> Option<CacheEntry> {
        let cache_path = self.get_cache_path(path)?;
        let content = fs::read(&cache_path).ok()?;
        match bincode::deserialize::<CacheEntry>(&content) {
            Ok(entry) if entry.record.path == path => Some(entry),
            Ok(_) => None,
            Err(e) => {
                Logger::warn(&format!("Discarding unreadable cache entry {}: {}", cache_path.display(), e));
                None
            }
        }
    }

    fn save_to_disk(&self, entry: &CacheEntry) -> Result<()> {
        let Some(cache_path) = self.get_cache_path(&entry.record.path) else {
            return Ok(());
        };
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = bincode::serialize(entry)
            .map_err(|e| InterlockError::Cache(format!("Failed to serialize cache entry: {}", e)))?;
        fs::write(&cache_path, serialized)?;
        Ok(())
    }

    fn get_cache_path(&self, path: &Path) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let key = blake3::hash(path.to_string_lossy().as_bytes()).to_hex().to_string();
        Some(dir.join("modules").join(&key[..2]).join(format!("{}.cache", key)))
    }
}

impl Default for CompilationCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for CompilationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationCache")
            .field("entries", &self.memory_cache.len())
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}
