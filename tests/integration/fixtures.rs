use interlock::BuildOptions;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Two entry points sharing `lib-a`, which is also an explicit split point.
pub fn two_entry_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app/entry-a.js", "var a = require('./shared/lib-a');\nvar b = require(\"./shared/lib-b\");\nmodule.exports = a + b;\n");
    write(root, "app/entry-b.js", "var a = require('./shared/lib-a');\nvar c = require('./shared/lib-c');\nmodule.exports = a * c;\n");
    write(root, "app/shared/lib-a.js", "module.exports = 1;\n");
    write(root, "app/shared/lib-b.js", "// keep me\nmodule.exports = 2;\n");
    write(root, "app/shared/lib-c.js", "/* block */\nmodule.exports = 3;\n");
    dir
}

pub fn two_entry_options(root: &Path) -> BuildOptions {
    let mut opts = BuildOptions {
        src_root: root.to_path_buf(),
        dest_root: root.join("dist"),
        source_maps: true,
        include_comments: true,
        ..Default::default()
    };
    opts.entry.insert("./app/entry-a.js".to_string(), "entry-a.bundle.js".into());
    opts.entry.insert("./app/entry-b.js".to_string(), "entry-b.bundle.js".into());
    opts.split.insert("./app/shared/lib-a.js".to_string(), "[setHash].js".to_string());
    opts
}

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
