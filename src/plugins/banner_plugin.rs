// Banner Plugin: Adds a comment banner to the top of emitted bundles

use crate::core::models::EmittedArtifact;
use crate::core::plugin::Plugin;
use crate::core::registry::ExtensionRegistry;
use crate::core::services::EmitRawBundles;
use crate::utils::{Logger, Result};
use futures::FutureExt;
use std::sync::Arc;

/// Plugin that adds a banner comment to the top of every `.js` bundle
///
/// The banner shares the bundle's first line, so source map line mappings
/// stay valid. Text that is not already a block comment gets wrapped in one.
///
/// # Example
/// ```no_run
/// use interlock::plugins::BannerPlugin;
/// use interlock::{BuildOptions, Interlock};
/// use std::sync::Arc;
///
/// # fn run() -> interlock::Result<()> {
/// let bundler = Interlock::new(BuildOptions::default())?
///     .with_plugin(Arc::new(BannerPlugin::new("/*! MyApp v1.0.0 */")));
/// # Ok(())
/// # }
/// ```
pub struct BannerPlugin {
    banner: Arc<str>,
}

impl BannerPlugin {
    pub fn new(banner: impl Into<String>) -> Self {
        let banner = banner.into();
        let banner = if banner.trim_start().starts_with("/*") && banner.trim_end().ends_with("*/") {
            banner
        } else {
            format!("/* {} */", banner.replace("*/", "* /"))
        };
        Self {
            banner: banner.replace(['\r', '\n'], " ").into(),
        }
    }

    pub fn banner(&self) -> &str {
        &self.banner
    }
}

fn apply_banner(banner: &str, artifacts: Vec<EmittedArtifact>) -> Vec<EmittedArtifact> {
    artifacts
        .into_iter()
        .map(|artifact| match artifact {
            EmittedArtifact::Bundle { bundle, raw } if bundle.dest.ends_with(".js") => EmittedArtifact::Bundle {
                raw: format!("{} {}", banner, raw),
                bundle,
            },
            other => other,
        })
        .collect()
}

impl Plugin for BannerPlugin {
    fn name(&self) -> &str {
        "banner-plugin"
    }

    fn register(&self, registry: &mut ExtensionRegistry) -> Result<()> {
        Logger::debug(&format!("Banner plugin initialized with banner: {}", self.banner));
        let banner = self.banner.clone();
        registry.add_transform::<EmitRawBundles>(move |_cx, artifacts, _args| {
            let banner = banner.clone();
            async move { Ok(apply_banner(&banner, artifacts)) }.boxed()
        })
    }
}
