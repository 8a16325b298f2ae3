use crate::core::pluggable::ExtensionPoint;
use std::path::PathBuf;
use thiserror::Error;

/// Source location attached to parse and codegen failures
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line: Option<usize>,
    pub code_snippet: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.code_snippet = Some(snippet);
        self
    }
}

#[derive(Error, Debug)]
pub enum InterlockError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot resolve '{specifier}' from {}", importer.display())]
    Resolve { specifier: String, importer: PathBuf },

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Code generation error: {message}")]
    Codegen {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("{caller:?} called {dependency:?}, which it does not declare as a dependency")]
    UndeclaredDependency {
        caller: ExtensionPoint,
        dependency: ExtensionPoint,
    },

    #[error("Extension registry error: {0}")]
    Registry(String),

    #[error("Extension for {point:?} failed: {message}")]
    Extension {
        point: ExtensionPoint,
        message: String,
    },

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Other(String),
}

impl InterlockError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            context: None,
        }
    }

    pub fn parse_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Parse {
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::Codegen {
            message: message.into(),
            context: None,
        }
    }

    pub fn codegen_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Codegen {
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn extension(point: ExtensionPoint, message: impl Into<String>) -> Self {
        Self::Extension {
            point,
            message: message.into(),
        }
    }

    /// Format error with enhanced context display
    pub fn format_detailed(&self) -> String {
        match self {
            InterlockError::Parse { message, context } => {
                self.format_error_with_context("Parse Error", message, context)
            }
            InterlockError::Codegen { message, context } => {
                self.format_error_with_context("Codegen Error", message, context)
            }
            _ => format!("❌ {}", self),
        }
    }

    fn format_error_with_context(
        &self,
        error_type: &str,
        message: &str,
        context: &Option<ErrorContext>,
    ) -> String {
        let mut output = format!("❌ {}: {}", error_type, message);

        if let Some(ctx) = context {
            if let Some(ref file_path) = ctx.file_path {
                output.push_str(&format!("\n📁 File: {}", file_path.display()));
            }

            if let Some(line) = ctx.line {
                output.push_str(&format!("\n📍 Line: {}", line));
            }

            if let Some(ref snippet) = ctx.code_snippet {
                output.push_str(&format!(
                    "\n📝 Code:\n{}",
                    self.format_code_snippet(snippet, ctx.line)
                ));
            }
        }

        output
    }

    fn format_code_snippet(&self, snippet: &str, error_line: Option<usize>) -> String {
        let mut output = String::new();

        for (i, line) in snippet.lines().enumerate() {
            let line_num = i + 1;
            if error_line == Some(line_num) {
                output.push_str(&format!("→ {:3} │ {}\n", line_num, line));
            } else {
                output.push_str(&format!("  {:3} │ {}\n", line_num, line));
            }
        }

        output
    }
}

pub type Result<T> = std::result::Result<T, InterlockError>;

impl From<regex::Error> for InterlockError {
    fn from(err: regex::Error) -> Self {
        InterlockError::parse(format!("Regex error: {}", err))
    }
}

impl From<serde_json::Error> for InterlockError {
    fn from(err: serde_json::Error) -> Self {
        InterlockError::config(err.to_string())
    }
}

impl From<anyhow::Error> for InterlockError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<InterlockError>() {
            Ok(inner) => inner,
            Err(other) => InterlockError::Other(other.to_string()),
        }
    }
}
