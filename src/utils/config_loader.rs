use crate::core::models::BuildOptions;
use crate::utils::{InterlockError, Logger, Result};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "interlock.config.json";

/// Values given on the command line. `None` keeps the file's value.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub src_root: Option<PathBuf>,
    pub dest_root: Option<PathBuf>,
    pub source_maps: Option<bool>,
    pub compact: Option<bool>,
    pub include_comments: Option<bool>,
}

/// Config loader that supports config files with CLI override
pub struct ConfigLoader;

impl ConfigLoader {
    /// `explicit` if given, otherwise `interlock.config.json` under `root`
    pub fn locate(root: &Path, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => root.join(path),
            None => root.join(CONFIG_FILE_NAME),
        }
    }

    /// Load options from a config file.
    ///
    /// Relative `srcRoot`, `destRoot` and `cacheDir` resolve against the
    /// directory holding the file.
    pub fn load_from_file(config_path: &Path) -> Result<BuildOptions> {
        if !config_path.is_file() {
            return Err(InterlockError::config(format!(
                "No configuration file found at {}",
                config_path.display()
            )));
        }

        Logger::debug(&format!("Loading config from {}", config_path.display()));

        let content = std::fs::read_to_string(config_path)?;
        let mut opts: BuildOptions = serde_json::from_str(&content).map_err(|e| {
            InterlockError::config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;

        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        opts.src_root = resolve_against(base, &opts.src_root);
        opts.dest_root = resolve_against(base, &opts.dest_root);
        opts.cache_dir = opts.cache_dir.map(|dir| resolve_against(base, &dir));

        Logger::debug("✅ Config file loaded successfully");
        Ok(opts)
    }

    /// Merge file config with CLI arguments (CLI takes precedence).
    /// CLI paths resolve against `cwd`.
    pub fn merge_with_cli(mut opts: BuildOptions, overrides: &CliOverrides, cwd: &Path) -> BuildOptions {
        if let Some(src_root) = &overrides.src_root {
            opts.src_root = resolve_against(cwd, src_root);
        }
        if let Some(dest_root) = &overrides.dest_root {
            opts.dest_root = resolve_against(cwd, dest_root);
        }
        if let Some(source_maps) = overrides.source_maps {
            opts.source_maps = source_maps;
        }
        if let Some(include_comments) = overrides.include_comments {
            opts.include_comments = include_comments;
        }
        if let Some(compact) = overrides.compact {
            opts.pretty = Some(!compact);
        }
        opts
    }

    pub fn load(cwd: &Path, explicit: Option<&Path>, overrides: &CliOverrides) -> Result<BuildOptions> {
        let config_path = Self::locate(cwd, explicit);
        let opts = Self::load_from_file(&config_path)?;
        Ok(Self::merge_with_cli(opts, overrides, cwd))
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
