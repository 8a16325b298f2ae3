// Watch mode for Interlock
// Monitors source changes and drives incremental rebuilds

use crate::core::context::CompilationContext;
use crate::core::models::{BuildEvent, Compilation};
use crate::core::services::{compile, save_bundles};
use crate::utils::{InterlockError, Logger, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;

pub type BuildObserver = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

/// Subscribers to build events, called in subscription order
#[derive(Clone, Default)]
pub struct BuildObservers {
    observers: Arc<RwLock<Vec<BuildObserver>>>,
}

impl BuildObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: BuildObserver) {
        self.observers.write().push(observer);
    }

    pub fn emit(&self, event: &BuildEvent) {
        let observers = self.observers.read().clone();
        for observer in observers {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

/// Configuration for watch mode
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period after the last change before rebuilding
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// One compilation context reused across rebuilds, so the module cache
/// carries over.
pub struct WatchSession {
    context: CompilationContext,
    observers: BuildObservers,
    save: bool,
}

impl WatchSession {
    pub fn new(context: CompilationContext, observers: BuildObservers, save: bool) -> Self {
        Self {
            context,
            observers,
            save,
        }
    }

    pub fn context(&self) -> &CompilationContext {
        &self.context
    }

    pub async fn initial_build(&self) -> Result<Arc<Compilation>> {
        let compilation = Arc::new(compile(&self.context).await?);
        if self.save {
            save_bundles(&self.context, compilation.clone()).await?;
        }
        self.observers.emit(&BuildEvent::compiled(compilation.clone()));
        Ok(compilation)
    }

    /// First build of a session. Failure is reported as an error event.
    pub async fn start(&self) -> Option<Arc<Compilation>> {
        match self.initial_build().await {
            Ok(compilation) => Some(compilation),
            Err(e) => {
                Logger::error(&format!("Initial build failed: {}", e));
                self.observers.emit(&BuildEvent::failed(e));
                None
            }
        }
    }

    /// Rebuild after `changed` files were modified.
    ///
    /// Observers receive a patch event carrying the changed modules, then a
    /// compilation event. A failed rebuild is reported as an error event.
    pub async fn apply_changes(&self, changed: &[PathBuf]) -> Option<Arc<Compilation>> {
        for path in changed {
            self.context.cache.invalidate(path);
        }

        let start = Instant::now();
        match self.rebuild(changed).await {
            Ok(compilation) => {
                Logger::info(&format!("✅ Rebuild complete in {:.0}ms", start.elapsed().as_millis()));
                Some(compilation)
            }
            Err(e) => {
                Logger::error(&format!("Rebuild failed: {}", e));
                self.observers.emit(&BuildEvent::failed(e));
                None
            }
        }
    }

    async fn rebuild(&self, changed: &[PathBuf]) -> Result<Arc<Compilation>> {
        let compilation = Arc::new(compile(&self.context).await?);

        let patched = compilation.modules_at(changed);
        if !patched.is_empty() {
            self.observers.emit(&BuildEvent::patch(patched));
        }
        self.observers.emit(&BuildEvent::compiled(compilation.clone()));

        if self.save {
            save_bundles(&self.context, compilation.clone()).await?;
        }
        Ok(compilation)
    }
}

/// Keeps the file watcher alive; dropping it stops watching.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start watching the session's source root. Must be called inside a
/// tokio runtime.
pub fn spawn_watcher(session: Arc<WatchSession>, config: WatchConfig) -> Result<WatchHandle> {
    let opts = session.context().opts.clone();
    let src_root = opts
        .src_root
        .canonicalize()
        .map_err(|e| InterlockError::Watch(format!("Cannot watch {}: {}", opts.src_root.display(), e)))?;
    let ignored_dirs: Vec<PathBuf> = [opts.dest_root.clone(), opts.cache_dir()]
        .into_iter()
        .map(|dir| dir.canonicalize().unwrap_or(dir))
        .collect();

    let (tx, mut rx) = unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| InterlockError::Watch(format!("Failed to create watcher: {}", e)))?;

    watcher
        .watch(&src_root, RecursiveMode::Recursive)
        .map_err(|e| InterlockError::Watch(format!("Failed to watch {}: {}", src_root.display(), e)))?;

    Logger::info("👀 Watch mode started - monitoring for changes...");
    Logger::info(&format!("   Watching: {}", src_root.display()));

    let debounce = Duration::from_millis(config.debounce_ms);
    let task = tokio::spawn(async move {
        session.start().await;

        while let Some(event) = rx.recv().await {
            let mut changed = BTreeSet::new();
            collect_changes(&event, &ignored_dirs, &mut changed);

            // Drain the burst of events that usually follows a save.
            while let Ok(Some(event)) = tokio::time::timeout(debounce, rx.recv()).await {
                collect_changes(&event, &ignored_dirs, &mut changed);
            }

            if changed.is_empty() {
                continue;
            }

            let changed: Vec<PathBuf> = changed.into_iter().collect();
            Logger::info(&format!("🔄 Rebuilding... ({} files changed)", changed.len()));
            for path in &changed {
                Logger::debug(&format!("  • {}", path.display()));
            }
            session.apply_changes(&changed).await;
        }
    });

    Ok(WatchHandle {
        _watcher: watcher,
        task,
    })
}

fn collect_changes(event: &Event, ignored_dirs: &[PathBuf], changed: &mut BTreeSet<PathBuf>) {
    if matches!(event.kind, EventKind::Access(_) | EventKind::Other) {
        return;
    }
    for path in &event.paths {
        if should_ignore(path, ignored_dirs) || !is_source_file(path) {
            continue;
        }
        changed.insert(path.canonicalize().unwrap_or_else(|_| path.clone()));
    }
}

fn should_ignore(path: &Path, ignored_dirs: &[PathBuf]) -> bool {
    let hidden_component = path.components().any(|c| match c {
        Component::Normal(part) => part == ".git" || part == "node_modules",
        _ => false,
    });
    let path_str = path.to_string_lossy();
    hidden_component
        || ignored_dirs.iter().any(|dir| path.starts_with(dir))
        || path_str.ends_with('~')
        || path_str.ends_with(".swp")
}

/// Check if path is a source file that should trigger rebuild
fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("js" | "mjs" | "cjs" | "json")
    )
}
