// Interlock - a pluggable CommonJS module bundler
//
// Every build step is an extension point: plugins can replace a step with an
// override or post-process its result with a transform.

pub mod bundler;
pub mod cache;
pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod plugins;
pub mod utils;

pub use crate::bundler::Interlock;
pub use crate::cache::CompilationCache;
pub use crate::core::context::{bootstrap_compilation, Collaborators, CompilationContext};
pub use crate::core::models::{
    BuildEvent, BuildOptions, Bundle, CacheMode, Compilation, EmittedArtifact, EntryDest, Module,
    PluginSpec,
};
pub use crate::core::pluggable::{promise, stream, ExecutionContext, ExtensionPoint, Handled, Pluggable};
pub use crate::core::plugin::Plugin;
pub use crate::core::registry::ExtensionRegistry;
pub use crate::utils::{InterlockError, Result};
