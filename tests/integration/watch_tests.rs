use crate::fixtures::{two_entry_options, two_entry_project, write};
use interlock::utils::{BuildObservers, WatchSession};
use interlock::{bootstrap_compilation, BuildEvent, Collaborators, CompilationCache};
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;

#[tokio::test]
async fn test_rebuild_patches_changed_module_and_saves() {
    let project = two_entry_project();
    let root = project.path();

    let events: Arc<Mutex<Vec<BuildEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let observers = BuildObservers::new();
    {
        let events = events.clone();
        observers.subscribe(Arc::new(move |event: &BuildEvent| events.lock().push(event.clone())));
    }

    let context = bootstrap_compilation(
        Arc::new(two_entry_options(root)),
        Arc::new(CompilationCache::in_memory()),
        &[],
        Collaborators::default(),
    )
    .unwrap();
    let session = WatchSession::new(context, observers, true);

    let first = session.initial_build().await.unwrap();
    assert_eq!(events.lock().len(), 1);
    events.lock().clear();

    write(root, "app/shared/lib-b.js", "module.exports = 'two';\n");
    let lib_b = root.join("app/shared/lib-b.js").canonicalize().unwrap();
    let second = session.apply_changes(&[lib_b.clone()]).await.unwrap();

    {
        let events = events.lock();
        assert_eq!(events.len(), 2);
        let patch = events[0].patch_modules.as_ref().unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch[0].ns_path, "./app/shared/lib-b.js");
        assert!(events[1].compilation.is_some());
    }

    assert_ne!(
        first.bundles["entry-a.bundle.js"].raw(),
        second.bundles["entry-a.bundle.js"].raw()
    );
    // The split bundle carries no urls, so it is untouched
    let split = first.bundles.keys().find(|dest| !dest.starts_with("entry-")).unwrap();
    assert_eq!(first.bundles[split].raw(), second.bundles[split].raw());

    let written = fs::read_to_string(root.join("dist/entry-a.bundle.js")).unwrap();
    assert!(written.contains("module.exports = 'two';"));
}

#[tokio::test]
async fn test_broken_change_reports_error_and_keeps_last_output() {
    let project = two_entry_project();
    let root = project.path();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let observers = BuildObservers::new();
    {
        let errors = errors.clone();
        observers.subscribe(Arc::new(move |event: &BuildEvent| {
            if let Some(error) = &event.error {
                errors.lock().push(error.to_string());
            }
        }));
    }

    let context = bootstrap_compilation(
        Arc::new(two_entry_options(root)),
        Arc::new(CompilationCache::in_memory()),
        &[],
        Collaborators::default(),
    )
    .unwrap();
    let session = WatchSession::new(context, observers, true);
    session.initial_build().await.unwrap();
    let before = fs::read_to_string(root.join("dist/entry-a.bundle.js")).unwrap();

    write(root, "app/entry-a.js", "require('./shared/gone');\n");
    let entry_a = root.join("app/entry-a.js").canonicalize().unwrap();
    assert!(session.apply_changes(&[entry_a]).await.is_none());

    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("./shared/gone"));
    assert_eq!(fs::read_to_string(root.join("dist/entry-a.bundle.js")).unwrap(), before);
}
