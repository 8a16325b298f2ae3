use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub struct Logger;

impl Logger {
    /// Install the global subscriber. `RUST_LOG` wins over the default filter.
    pub fn init() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("interlock=info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn build_start(src_root: &str, dest_root: &str, entries: usize, splits: usize) {
        info!("🔗 Interlock - Build");
        info!("═══════════════════════════════════════");
        info!("📁 Source: {}", src_root);
        info!("📦 Output: {}", dest_root);
        info!("🎯 {} entry module(s), {} split point(s)", entries, splits);
    }

    pub fn stage(name: &str) {
        debug!("⚙️  Stage: {}", name);
    }

    pub fn module_mapped(path: &str, hash: &str) {
        debug!("🔍 Mapped module: {} ({})", path, hash);
    }

    pub fn bundle_emitted(dest: &str, bytes: usize) {
        debug!("📄 Emitted {} ({} bytes)", dest, bytes);
    }

    pub fn build_complete(bundle_count: usize, build_time: std::time::Duration, dest_root: &str) {
        info!("");
        info!("📊 Build Statistics:");
        info!("  • Artifacts emitted: {}", bundle_count);
        info!("  • Build time: {:.2?}", build_time);
        info!("  • Output directory: {}", dest_root);
        info!("");
        info!("✅ Build completed successfully!");
    }

    pub fn info(msg: &str) {
        info!("{}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
