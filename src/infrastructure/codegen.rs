use crate::core::interfaces::CodeGenerator;
use crate::core::models::{BundleAst, CodegenOptions, GeneratedCode, ModuleDefinition};
use crate::utils::source_maps::{SourceMapGenerator, SourceMapUtils};
use crate::utils::{ErrorContext, InterlockError, Result};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions as OxcCodegenOptions};
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;
use std::path::{Path, PathBuf};

/// Module registry and loader shared by every bundle on a page.
/// Defines `__interlock__` once; later bundles reuse it.
const RUNTIME: &str = r#"(function (global) {
  if (global.__interlock__) {
    return;
  }
  var definitions = {};
  var instances = {};
  var locations = {};
  var pending = {};

  function load(hash) {
    if (instances[hash]) {
      return instances[hash].exports;
    }
    var definition = definitions[hash];
    if (!definition) {
      throw new Error("interlock: module " + hash + " is not loaded");
    }
    var module = { id: hash, exports: {} };
    instances[hash] = module;
    definition.fn.call(module.exports, load, module, module.exports);
    return module.exports;
  }

  function fetch(hash) {
    var url = locations[hash];
    if (!url) {
      return Promise.reject(new Error("interlock: no bundle provides " + hash));
    }
    if (!pending[url]) {
      pending[url] = new Promise(function (resolve, reject) {
        var script = document.createElement("script");
        script.src = url;
        script.onload = resolve;
        script.onerror = reject;
        document.head.appendChild(script);
      });
    }
    return pending[url];
  }

  function missing(hash, seen, out) {
    if (seen[hash]) {
      return;
    }
    seen[hash] = true;
    var definition = definitions[hash];
    if (!definition) {
      out.push(hash);
      return;
    }
    for (var i = 0; i < definition.deps.length; i++) {
      missing(definition.deps[i], seen, out);
    }
  }

  function boot(hash) {
    var needed = [];
    missing(hash, {}, needed);
    if (needed.length === 0) {
      load(hash);
      return Promise.resolve();
    }
    return Promise.all(needed.map(fetch)).then(function () {
      return boot(hash);
    });
  }

  global.__interlock__ = {
    register: function (modules) {
      for (var hash in modules) {
        if (!definitions[hash]) {
          definitions[hash] = modules[hash];
        }
      }
    },
    urls: function (map) {
      for (var hash in map) {
        locations[hash] = map[hash];
      }
    },
    load: load,
    boot: boot
  };
})(typeof globalThis !== "undefined" ? globalThis : this);"#;

/// Renders a bundle AST to JavaScript
pub struct JsCodeGenerator;

impl JsCodeGenerator {
    pub fn new() -> Self {
        Self
    }

    fn render_module(
        out: &mut Output,
        module: &ModuleDefinition,
        options: &CodegenOptions,
        separator: &str,
    ) -> Result<()> {
        let source = out.add_source(&module.ns_path, &module.original_source);
        let body = if options.compact || !options.include_comments {
            strip_comments(&module.body, &module.ns_path)?
        } else {
            module.body.clone()
        };
        let hash = quote(&module.hash);
        let deps: Vec<String> = module.dependencies.iter().map(|d| quote(d)).collect();

        if options.compact {
            let function = minify_module(&body, &module.ns_path)?;
            out.push_mapped(
                &format!("{}:{{deps:[{}],fn:{}}}{}", hash, deps.join(","), function, separator),
                source,
                0,
            );
            return Ok(());
        }

        out.push_line(&format!("  {}: {{", hash));
        out.push_line(&format!("    deps: [{}],", deps.join(", ")));
        out.push_line("    fn: function (require, module, exports) {");
        for (line, text) in body.lines().enumerate() {
            out.push_mapped(text, source, line as u32);
        }
        out.push_line("    }");
        out.push_line(&format!("  }}{}", separator));
        Ok(())
    }
}

impl Default for JsCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator for JsCodeGenerator {
    fn generate(&self, ast: &BundleAst, dest: &str, options: &CodegenOptions) -> Result<GeneratedCode> {
        let file = file_name(dest);
        let mut out = Output::new(options.source_maps.then_some(file.as_str()));

        if ast.include_runtime {
            if options.compact {
                out.push_text(&minify_script(RUNTIME, "interlock-runtime.js")?);
            } else {
                out.push_text(RUNTIME);
            }
        }

        out.push_line("__interlock__.register({");
        let count = ast.modules.len();
        for (index, module) in ast.modules.iter().enumerate() {
            let separator = if index + 1 < count { "," } else { "" };
            Self::render_module(&mut out, module, options, separator)?;
        }
        out.push_line("});");

        if let Some(urls) = &ast.urls {
            let entries: Vec<(String, String)> = urls.iter().map(|(h, d)| (quote(h), quote(d))).collect();
            if options.compact {
                let body: Vec<String> = entries.iter().map(|(h, d)| format!("{}:{}", h, d)).collect();
                out.push_line(&format!("__interlock__.urls({{{}}});", body.join(",")));
            } else {
                out.push_line("__interlock__.urls({");
                let last = entries.len().saturating_sub(1);
                for (index, (hash, dest)) in entries.iter().enumerate() {
                    let separator = if index < last { "," } else { "" };
                    out.push_line(&format!("  {}: {}{}", hash, dest, separator));
                }
                out.push_line("});");
            }
        }

        if let Some(hash) = &ast.entry_module_hash {
            out.push_line(&format!("__interlock__.boot({});", quote(hash)));
        }

        let map = match out.map.take() {
            Some(generator) => {
                out.push_line(&SourceMapUtils::generate_external_comment(&format!("{}.map", file)));
                Some(SourceMapUtils::to_json(&generator.generate())?)
            }
            None => None,
        };

        Ok(GeneratedCode { code: out.code, map })
    }
}

/// Generated code plus line bookkeeping for the source map
struct Output {
    code: String,
    line: u32,
    map: Option<SourceMapGenerator>,
}

impl Output {
    fn new(map_file: Option<&str>) -> Self {
        Self {
            code: String::new(),
            line: 0,
            map: map_file.map(|file| SourceMapGenerator::new(Some(file))),
        }
    }

    fn add_source(&mut self, path: &str, content: &str) -> u32 {
        match &mut self.map {
            Some(map) => map.add_source(path, content),
            None => 0,
        }
    }

    fn push_line(&mut self, text: &str) {
        self.code.push_str(text);
        self.code.push('\n');
        self.line += 1;
    }

    fn push_text(&mut self, text: &str) {
        for line in text.lines() {
            self.push_line(line);
        }
    }

    fn push_mapped(&mut self, text: &str, source: u32, original_line: u32) {
        if let Some(map) = &mut self.map {
            map.add_mapping(self.line, 0, source, original_line, 0);
        }
        if text.contains('\n') {
            self.push_text(text);
        } else {
            self.push_line(text);
        }
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn file_name(dest: &str) -> String {
    Path::new(dest)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dest.to_string())
}

fn source_type() -> SourceType {
    SourceType::from_path("bundle.cjs").unwrap_or_else(|_| SourceType::default())
}

fn parse_error(errors: Vec<String>, label: &str, source: &str) -> InterlockError {
    let context = ErrorContext::new()
        .with_file(PathBuf::from(label))
        .with_snippet(source.to_string());
    InterlockError::parse_with_context(errors.join("\n"), context)
}

/// Parse and reprint a script with oxc's minified printer
fn minify_script(source: &str, label: &str) -> Result<String> {
    let allocator = Allocator::default();
    let parse_result = Parser::new(&allocator, source, source_type()).parse();
    if !parse_result.errors.is_empty() {
        let errors = parse_result.errors.iter().map(|e| e.to_string()).collect();
        return Err(parse_error(errors, label, source));
    }

    let codegen_options = OxcCodegenOptions {
        minify: true,
        ..Default::default()
    };
    let code = Codegen::new()
        .with_options(codegen_options)
        .build(&parse_result.program)
        .code;

    Ok(code.trim_end().to_string())
}

/// Minify a module body as the function expression the runtime calls
fn minify_module(body: &str, ns_path: &str) -> Result<String> {
    let wrapped = format!(
        "var __interlock_fn__ = function (require, module, exports) {{\n{}\n}};",
        body
    );
    let minified = minify_script(&wrapped, ns_path)?;

    match (minified.find("function"), minified.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(minified[start..=end].to_string()),
        _ => Err(InterlockError::codegen_with_context(
            "minified module lost its function wrapper",
            ErrorContext::new().with_file(PathBuf::from(ns_path)),
        )),
    }
}

/// Remove every comment the parser finds in a module body. Newlines inside
/// block comments are kept so line numbers stay stable.
pub fn strip_comments(source: &str, label: &str) -> Result<String> {
    let allocator = Allocator::default();
    let options = ParseOptions {
        allow_return_outside_function: true,
        ..Default::default()
    };
    let parse_result = Parser::new(&allocator, source, source_type())
        .with_options(options)
        .parse();
    if !parse_result.errors.is_empty() {
        let errors = parse_result.errors.iter().map(|e| e.to_string()).collect();
        return Err(parse_error(errors, label, source));
    }

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for comment in parse_result.program.comments.iter() {
        let start = comment.span.start as usize;
        let end = comment.span.end as usize;
        out.push_str(&source[cursor..start]);
        out.extend(source[start..end].chars().filter(|&c| c == '\n'));
        cursor = end;
    }
    out.push_str(&source[cursor..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Urls;
    use sourcemap::SourceMap;

    fn definition(hash: &str, body: &str, deps: &[&str]) -> ModuleDefinition {
        ModuleDefinition {
            hash: hash.to_string(),
            ns_path: format!("./{}.js", hash),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            body: body.to_string(),
            original_source: body.to_string(),
        }
    }

    fn entry_ast() -> BundleAst {
        let mut urls = Urls::new();
        urls.insert("main".to_string(), "entry.js".to_string());
        urls.insert("lib".to_string(), "lib.js".to_string());
        BundleAst {
            include_runtime: true,
            urls: Some(urls),
            entry_module_hash: Some("main".to_string()),
            modules: vec![definition(
                "main",
                "// say hello\nvar lib = require(\"lib\");\nmodule.exports = 42;\n",
                &["lib"],
            )],
        }
    }

    #[test]
    fn test_strip_comments_keeps_strings_and_lines() {
        let source = "var url = \"http://example.com\"; // trailing\n/* a\nb */var re = /\\/\\/not-a-comment/g;\nvar t = `// kept`;";
        let stripped = strip_comments(source, "./a.js").unwrap();
        assert!(stripped.contains("\"http://example.com\""));
        assert!(!stripped.contains("trailing"));
        assert!(stripped.contains("/\\/\\/not-a-comment/g"));
        assert!(stripped.contains("`// kept`"));
        assert_eq!(stripped.lines().count(), source.lines().count());
    }

    #[test]
    fn test_strip_comments_leaves_regex_after_keyword() {
        let source = "function f(s) {\n  return /[/*]/.test(s);\n}\nmodule.exports = f; // done\n";
        let stripped = strip_comments(source, "./f.js").unwrap();
        assert_eq!(
            stripped,
            "function f(s) {\n  return /[/*]/.test(s);\n}\nmodule.exports = f; \n"
        );
    }

    #[test]
    fn test_strip_comments_allows_top_level_return() {
        let stripped = strip_comments("if (done) return; /* early */\nmodule.exports = 1;", "./r.js").unwrap();
        assert_eq!(stripped, "if (done) return; \nmodule.exports = 1;");
    }

    #[test]
    fn test_strip_comments_rejects_invalid_module() {
        let err = strip_comments("var = ;", "./bad.js").unwrap_err();
        assert!(matches!(err, InterlockError::Parse { .. }));
    }

    #[test]
    fn test_pretty_output_with_comments() {
        let options = CodegenOptions {
            compact: false,
            include_comments: true,
            source_maps: false,
        };
        let generated = JsCodeGenerator::new().generate(&entry_ast(), "entry.js", &options).unwrap();

        assert!(generated.map.is_none());
        assert!(generated.code.contains("global.__interlock__ = {"));
        assert!(generated.code.contains("  \"main\": {"));
        assert!(generated.code.contains("    deps: [\"lib\"],"));
        assert!(generated.code.contains("// say hello"));
        assert!(generated.code.contains("  \"lib\": \"lib.js\","));
        assert!(generated.code.ends_with("__interlock__.boot(\"main\");\n"));
    }

    #[test]
    fn test_pretty_output_strips_comments_by_default() {
        let generated = JsCodeGenerator::new()
            .generate(&entry_ast(), "entry.js", &CodegenOptions::default())
            .unwrap();
        assert!(!generated.code.contains("say hello"));
        assert!(generated.code.contains("module.exports = 42;"));
    }

    #[test]
    fn test_non_entry_bundle_has_no_runtime_urls_or_boot() {
        let ast = BundleAst {
            modules: vec![definition("lib", "module.exports = 1;", &[])],
            ..Default::default()
        };
        let generated = JsCodeGenerator::new()
            .generate(&ast, "lib.js", &CodegenOptions::default())
            .unwrap();
        assert!(generated.code.starts_with("__interlock__.register({\n"));
        assert!(!generated.code.contains("__interlock__.urls"));
        assert!(!generated.code.contains("__interlock__.boot"));
    }

    #[test]
    fn test_compact_output_is_minified() {
        let options = CodegenOptions {
            compact: true,
            include_comments: true,
            source_maps: false,
        };
        let generated = JsCodeGenerator::new().generate(&entry_ast(), "entry.js", &options).unwrap();

        assert!(generated.code.lines().all(|line| !line.starts_with("  ")));
        assert!(!generated.code.contains("say hello"));
        assert!(generated.code.contains("module.exports=42"));
        assert!(generated.code.contains("__interlock__.urls({\"lib\":\"lib.js\",\"main\":\"entry.js\"});"));
    }

    #[test]
    fn test_source_map_is_emitted_alongside() {
        let options = CodegenOptions {
            compact: false,
            include_comments: true,
            source_maps: true,
        };
        let generated = JsCodeGenerator::new()
            .generate(&entry_ast(), "out/entry.js", &options)
            .unwrap();

        assert!(generated.code.ends_with("//# sourceMappingURL=entry.js.map\n"));
        let raw = generated.map.unwrap();
        let map = SourceMap::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(map.get_file(), Some("entry.js"));
        assert_eq!(map.sources().collect::<Vec<_>>(), vec!["./main.js"]);

        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["mappings"].as_str().unwrap().contains("AAAA;AACA;AACA"));
    }
}
