// Core domain layer
pub mod context;
pub mod interfaces;
pub mod models;
pub mod pluggable;
pub mod plugin;
pub mod registry;
pub mod services;

pub use context::*;
pub use interfaces::*;
pub use models::*;
pub use pluggable::*;
pub use plugin::*;
pub use registry::*;
pub use services::*;
