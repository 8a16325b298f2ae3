use crate::fixtures::{two_entry_options, two_entry_project, write};
use futures::FutureExt;
use interlock::core::services::{EmitRawBundles, InterpolateFilename};
use interlock::utils::{CliOverrides, ConfigLoader};
use interlock::{
    EmittedArtifact, ExtensionPoint, ExtensionRegistry, Handled, Interlock, InterlockError, Plugin,
};
use std::fs;
use std::sync::Arc;

struct SharedName;

impl Plugin for SharedName {
    fn name(&self) -> &str {
        "shared-name"
    }

    fn register(&self, registry: &mut ExtensionRegistry) -> interlock::Result<()> {
        registry.add_stream_override::<InterpolateFilename>(|_cx, bundle| {
            if bundle.is_entry {
                Ok(Handled::Continue)
            } else {
                Ok(Handled::Done("shared.js".to_string()))
            }
        })
    }
}

struct Explode;

impl Plugin for Explode {
    fn name(&self) -> &str {
        "explode"
    }

    fn register(&self, registry: &mut ExtensionRegistry) -> interlock::Result<()> {
        registry.add_transform::<EmitRawBundles>(|_cx, _artifacts, _args| {
            async { Err::<Vec<EmittedArtifact>, _>(InterlockError::extension(ExtensionPoint::EmitRawBundles, "boom")) }
                .boxed()
        })
    }
}

#[tokio::test]
async fn test_override_renames_split_bundle() {
    let project = two_entry_project();
    let compilation = Interlock::new(two_entry_options(project.path()))
        .unwrap()
        .with_plugin(Arc::new(SharedName))
        .compile()
        .await
        .unwrap();

    let shared = compilation.bundles["shared.js"].bundle().unwrap();
    assert!(!shared.is_entry);
    assert!(compilation.bundles.contains_key("entry-a.bundle.js"));

    let entry_a = compilation.bundles["entry-a.bundle.js"].raw();
    assert!(entry_a.contains(&format!("\"{}\": \"shared.js\"", shared.modules[0].hash)));
}

#[tokio::test]
async fn test_failing_transform_aborts_build() {
    let project = two_entry_project();
    let err = Interlock::new(two_entry_options(project.path()))
        .unwrap()
        .with_plugin(Arc::new(Explode))
        .build()
        .await
        .unwrap_err();

    assert!(matches!(err, InterlockError::Extension { point: ExtensionPoint::EmitRawBundles, .. }));
    assert!(!project.path().join("dist").exists());
}

#[tokio::test]
async fn test_config_file_plugins_run() {
    let project = two_entry_project();
    let root = project.path();
    write(
        root,
        "interlock.config.json",
        r#"{
            "destRoot": "out",
            "entry": { "./app/entry-a.js": "entry-a.bundle.js" },
            "sourceMaps": true,
            "plugins": [
                { "name": "banner", "banner": "/*! built */" },
                { "name": "stats", "verbose": true }
            ]
        }"#,
    );

    let opts = ConfigLoader::load(root, None, &CliOverrides::default()).unwrap();
    assert_eq!(opts.dest_root, root.join("out"));

    let compilation = Interlock::new(opts).unwrap().build().await.unwrap();
    for artifact in compilation.bundles.values() {
        match artifact {
            EmittedArtifact::Bundle { raw, .. } => assert!(raw.starts_with("/*! built */ ")),
            EmittedArtifact::SourceMap { raw, .. } => assert!(raw.starts_with('{')),
        }
    }

    let written = fs::read_to_string(root.join("out/entry-a.bundle.js")).unwrap();
    assert!(written.starts_with("/*! built */ "));
    assert!(root.join("out/entry-a.bundle.js.map").is_file());
}
