use crate::cache::CompilationCache;
use crate::core::context::{bootstrap_compilation, Collaborators, CompilationContext};
use crate::core::models::{BuildEvent, BuildOptions, Compilation};
use crate::core::plugin::Plugin;
use crate::core::services::{compile, save_bundles};
use crate::utils::{
    spawn_watcher, BuildObservers, InterlockError, Logger, Result, Timer, WatchConfig, WatchHandle,
    WatchSession,
};
use std::sync::Arc;

/// Entry point for programmatic use.
///
/// ```no_run
/// use interlock::{BuildOptions, Interlock};
///
/// # async fn run() -> interlock::Result<()> {
/// let mut opts = BuildOptions::default();
/// opts.entry.insert("./app/main.js".to_string(), "main.bundle.js".into());
///
/// let bundler = Interlock::new(opts)?;
/// bundler.observe(|event| {
///     if let Some(compilation) = &event.compilation {
///         println!("{} artifacts", compilation.bundles.len());
///     }
/// });
/// bundler.build().await?;
/// # Ok(())
/// # }
/// ```
pub struct Interlock {
    opts: Arc<BuildOptions>,
    cache: Arc<CompilationCache>,
    plugins: Vec<Arc<dyn Plugin>>,
    collaborators: Collaborators,
    observers: BuildObservers,
    watch_config: WatchConfig,
    watcher: Option<WatchHandle>,
}

impl Interlock {
    pub fn new(opts: BuildOptions) -> Result<Self> {
        let cache = CompilationCache::from_options(&opts)?;
        Ok(Self {
            opts: Arc::new(opts),
            cache: Arc::new(cache),
            plugins: Vec::new(),
            collaborators: Collaborators::default(),
            observers: BuildObservers::new(),
            watch_config: WatchConfig::default(),
            watcher: None,
        })
    }

    /// Register a plugin; it runs after the plugins named in the options
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn with_watch_config(mut self, config: WatchConfig) -> Self {
        self.watch_config = config;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.opts
    }

    pub fn cache(&self) -> &Arc<CompilationCache> {
        &self.cache
    }

    fn context(&self) -> Result<CompilationContext> {
        bootstrap_compilation(
            self.opts.clone(),
            self.cache.clone(),
            &self.plugins,
            self.collaborators.clone(),
        )
    }

    /// Compile without writing anything
    pub async fn compile(&self) -> Result<Compilation> {
        let cx = self.context()?;
        compile(&cx).await
    }

    /// Compile and write every artifact under `destRoot`
    pub async fn build(&self) -> Result<Arc<Compilation>> {
        Logger::build_start(
            &self.opts.src_root.display().to_string(),
            &self.opts.dest_root.display().to_string(),
            self.opts.entry.len(),
            self.opts.split.len(),
        );
        let timer = Timer::start("build");

        let cx = self.context()?;
        let compilation = Arc::new(compile(&cx).await?);
        save_bundles(&cx, compilation.clone()).await?;

        Logger::build_complete(
            compilation.bundles.len(),
            timer.elapsed(),
            &self.opts.dest_root.display().to_string(),
        );
        self.observers.emit(&BuildEvent::compiled(compilation.clone()));
        Ok(compilation)
    }

    /// Start or stop watch mode. Starting builds once in the background and
    /// then rebuilds on source changes; results reach observers as events.
    /// Starting requires a running tokio runtime.
    pub fn watch(&mut self, enable: bool) -> Result<&mut Self> {
        if !enable {
            if self.watcher.take().is_some() {
                Logger::info("👋 Stopping watch mode...");
            }
            return Ok(self);
        }

        if self.watcher.is_none() {
            tokio::runtime::Handle::try_current()
                .map_err(|e| InterlockError::Watch(format!("watch mode needs a tokio runtime: {}", e)))?;
            let session = Arc::new(WatchSession::new(self.context()?, self.observers.clone(), true));
            self.watcher = Some(spawn_watcher(session, self.watch_config.clone())?);
        }
        Ok(self)
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Subscribe to build events
    pub fn observe(&self, callback: impl Fn(&BuildEvent) + Send + Sync + 'static) -> &Self {
        self.observers.subscribe(Arc::new(callback));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::fs;

    fn project() -> (tempfile::TempDir, BuildOptions) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.js"), "module.exports = 'hi';\n").unwrap();
        let mut opts = BuildOptions {
            src_root: dir.path().to_path_buf(),
            dest_root: dir.path().join("dist"),
            ..Default::default()
        };
        opts.entry.insert("./main.js".to_string(), "main.bundle.js".into());
        (dir, opts)
    }

    #[tokio::test]
    async fn test_build_writes_and_notifies() {
        let (dir, opts) = project();
        let bundler = Interlock::new(opts).unwrap();
        let seen = Arc::new(Mutex::new(0));
        {
            let seen = seen.clone();
            bundler.observe(move |event| {
                if event.compilation.is_some() {
                    *seen.lock() += 1;
                }
            });
        }

        let compilation = bundler.build().await.unwrap();
        assert!(compilation.bundles.contains_key("main.bundle.js"));
        assert!(dir.path().join("dist/main.bundle.js").is_file());
        assert_eq!(*seen.lock(), 1);
    }

    #[tokio::test]
    async fn test_compile_does_not_write() {
        let (dir, opts) = project();
        let compilation = Interlock::new(opts).unwrap().compile().await.unwrap();
        assert_eq!(compilation.bundles.len(), 1);
        assert!(!dir.path().join("dist").exists());
    }

    #[tokio::test]
    async fn test_watch_toggles_and_chains() {
        let (_dir, opts) = project();
        let mut bundler = Interlock::new(opts).unwrap();

        assert!(bundler.watch(true).unwrap().is_watching());
        assert!(!bundler.watch(false).unwrap().is_watching());
    }

    #[tokio::test]
    async fn test_watch_builds_on_start() {
        let (dir, opts) = project();
        let mut bundler = Interlock::new(opts).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bundler.watch(true).unwrap().observe(move |event| {
            let _ = tx.send(event.compilation.is_some());
        });

        let compiled = tokio::time::timeout(std::time::Duration::from_secs(10), rx.recv())
            .await
            .unwrap();
        assert_eq!(compiled, Some(true));
        assert!(dir.path().join("dist/main.bundle.js").is_file());
    }

    #[tokio::test]
    async fn test_watch_reports_failed_first_build() {
        let (dir, opts) = project();
        fs::write(dir.path().join("main.js"), "require('./missing');\n").unwrap();
        let mut bundler = Interlock::new(opts).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bundler.watch(true).unwrap().observe(move |event| {
            let _ = tx.send(event.error.is_some());
        });

        let failed = tokio::time::timeout(std::time::Duration::from_secs(10), rx.recv())
            .await
            .unwrap();
        assert_eq!(failed, Some(true));
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_watch_outside_runtime_fails() {
        let (_dir, opts) = project();
        let mut bundler = Interlock::new(opts).unwrap();
        assert!(matches!(bundler.watch(true), Err(InterlockError::Watch(_))));
    }
}
