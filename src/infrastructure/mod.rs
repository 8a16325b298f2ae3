// Infrastructure layer: default collaborators
pub mod bundle_constructor;
pub mod bundle_splitter;
pub mod codegen;
pub mod file_system;
pub mod module_maps;
pub mod module_seeds;
pub mod node_resolver;

pub use bundle_constructor::*;
pub use bundle_splitter::*;
pub use codegen::*;
pub use file_system::*;
pub use module_maps::*;
pub use module_seeds::*;
pub use node_resolver::*;
