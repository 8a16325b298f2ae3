// Built-in plugins

pub mod banner_plugin;
pub mod stats_plugin;

pub use banner_plugin::BannerPlugin;
pub use stats_plugin::{BuildStats, StatsPlugin};
