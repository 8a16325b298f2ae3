// Source maps - line-level mappings with inline sources

use crate::utils::{InterlockError, Result};
use sourcemap::{SourceMap, SourceMapBuilder};

/// Source map generator
pub struct SourceMapGenerator {
    builder: SourceMapBuilder,
}

impl SourceMapGenerator {
    pub fn new(file_name: Option<&str>) -> Self {
        Self {
            builder: SourceMapBuilder::new(file_name),
        }
    }

    /// Add a source file with its content
    pub fn add_source(&mut self, source_path: &str, content: &str) -> u32 {
        let id = self.builder.add_source(source_path);
        self.builder.set_source_contents(id, Some(content));
        id
    }

    /// Add a mapping between generated and original positions, zero-based
    pub fn add_mapping(
        &mut self,
        generated_line: u32,
        generated_column: u32,
        source_id: u32,
        original_line: u32,
        original_column: u32,
    ) {
        self.builder.add_raw(
            generated_line,
            generated_column,
            original_line,
            original_column,
            Some(source_id),
            None,
            false,
        );
    }

    pub fn generate(self) -> SourceMap {
        self.builder.into_sourcemap()
    }
}

/// Source map utilities
pub struct SourceMapUtils;

impl SourceMapUtils {
    pub fn to_json(source_map: &SourceMap) -> Result<String> {
        let mut bytes = Vec::new();
        source_map
            .to_writer(&mut bytes)
            .map_err(|e| InterlockError::codegen(format!("Failed to serialize source map: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| InterlockError::codegen(format!("Source map is not UTF-8: {}", e)))
    }

    /// Generate source map comment for external file
    pub fn generate_external_comment(source_map_filename: &str) -> String {
        format!("//# sourceMappingURL={}", source_map_filename)
    }
}
