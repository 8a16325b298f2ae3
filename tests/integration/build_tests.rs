use crate::fixtures::{two_entry_options, two_entry_project, write};
use interlock::{CompilationCache, EmittedArtifact, Interlock, InterlockError};
use std::fs;

#[tokio::test]
async fn test_two_entry_build_with_split() {
    let project = two_entry_project();
    let root = project.path();

    let compilation = Interlock::new(two_entry_options(root))
        .unwrap()
        .build()
        .await
        .expect("Build should succeed");

    assert_eq!(compilation.bundles.len(), 6, "three bundles plus three maps");
    assert!(compilation.bundles.contains_key("entry-a.bundle.js"));
    assert!(compilation.bundles.contains_key("entry-b.bundle.js"));
    assert!(compilation.bundles.contains_key("entry-a.bundle.js.map"));
    assert!(compilation.bundles.contains_key("entry-b.bundle.js.map"));

    // The split point gets a content-derived name
    let split = compilation
        .bundles
        .values()
        .filter_map(EmittedArtifact::bundle)
        .find(|bundle| !bundle.is_entry)
        .expect("split bundle");
    assert_eq!(split.dest.len(), 23);
    assert!(split.dest.ends_with(".js"));
    assert!(split.dest[..20].chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(split.modules.len(), 1);
    assert_eq!(split.modules[0].ns_path, "./app/shared/lib-a.js");
    assert!(compilation.bundles.contains_key(&format!("{}.map", split.dest)));

    let lib_a = &split.modules[0].hash;
    let entry_a = compilation.bundles["entry-a.bundle.js"].raw();
    assert!(entry_a.contains("global.__interlock__"));
    assert!(entry_a.contains(&format!("\"{}\": \"{}\"", lib_a, split.dest)));
    assert!(entry_a.contains(&format!("require(\"{}\")", lib_a)));
    assert!(entry_a.contains("// keep me"));
    assert!(entry_a.contains("__interlock__.boot("));
    assert!(entry_a.contains("//# sourceMappingURL=entry-a.bundle.js.map"));

    let entry_b = compilation.bundles["entry-b.bundle.js"].raw();
    assert!(entry_b.contains("/* block */"));
    assert!(!entry_b.contains("// keep me"));

    let split_raw = compilation.bundles[&split.dest].raw();
    assert!(!split_raw.contains("__interlock__.boot"));
    assert!(!split_raw.contains("__interlock__.urls"));

    let map: serde_json::Value = serde_json::from_str(compilation.bundles["entry-a.bundle.js.map"].raw()).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "entry-a.bundle.js");
    assert_eq!(
        map["sources"],
        serde_json::json!(["./app/entry-a.js", "./app/shared/lib-b.js"])
    );

    for dest in compilation.bundles.keys() {
        assert!(root.join("dist").join(dest).is_file(), "{} should exist", dest);
    }
    assert_eq!(
        fs::read_to_string(root.join("dist/entry-a.bundle.js")).unwrap(),
        entry_a
    );
}

#[tokio::test]
async fn test_compact_output_is_smaller_and_comment_free() {
    let project = two_entry_project();
    let mut opts = two_entry_options(project.path());
    opts.source_maps = false;
    opts.include_comments = false;

    let pretty = Interlock::new(opts.clone()).unwrap().compile().await.unwrap();
    opts.pretty = Some(false);
    let compact = Interlock::new(opts).unwrap().compile().await.unwrap();

    assert_eq!(compact.bundles.len(), 3);
    let pretty_raw = pretty.bundles["entry-a.bundle.js"].raw();
    let compact_raw = compact.bundles["entry-a.bundle.js"].raw();
    assert!(compact_raw.len() < pretty_raw.len());
    assert!(compact_raw.contains("__interlock__"));
    assert!(!compact_raw.contains("keep me"));
    assert!(!compact_raw.contains("sourceMappingURL"));
}

#[tokio::test]
async fn test_missing_entry_is_resolve_error() {
    let project = two_entry_project();
    let mut opts = two_entry_options(project.path());
    opts.entry.insert("./app/missing.js".to_string(), "missing.js".into());

    let err = Interlock::new(opts).unwrap().build().await.unwrap_err();
    assert!(
        matches!(err, InterlockError::Resolve { ref specifier, .. } if specifier == "./app/missing.js"),
        "unexpected error: {}",
        err
    );
    assert!(!project.path().join("dist").exists(), "nothing is written on failure");
}

#[tokio::test]
async fn test_unresolvable_require_fails_build() {
    let project = two_entry_project();
    write(project.path(), "app/shared/lib-c.js", "module.exports = require('./nope');\n");

    let err = Interlock::new(two_entry_options(project.path()))
        .unwrap()
        .compile()
        .await
        .unwrap_err();
    assert!(matches!(err, InterlockError::Resolve { ref specifier, .. } if specifier == "./nope"));
}

#[tokio::test]
async fn test_disk_cache_survives_new_bundler() {
    let project = two_entry_project();
    let root = project.path();
    let mut opts = two_entry_options(root);
    opts.cache_mode = Some(interlock::CacheMode::Disk);
    opts.cache_dir = Some(root.join(".cache"));

    let first = Interlock::new(opts.clone()).unwrap().compile().await.unwrap();

    let cache = CompilationCache::persistent(&root.join(".cache")).unwrap();
    let lib_a = root.join("app/shared/lib-a.js").canonicalize().unwrap();
    let record = cache
        .get(&lib_a, &CompilationCache::content_hash("module.exports = 1;\n"))
        .expect("record loaded from disk");
    assert_eq!(record.ns_path, "./app/shared/lib-a.js");

    let second = Interlock::new(opts).unwrap().compile().await.unwrap();
    for (dest, artifact) in &first.bundles {
        assert_eq!(second.bundles[dest].raw(), artifact.raw());
    }
}
