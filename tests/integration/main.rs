mod build_tests;
mod fixtures;
mod plugin_tests;
mod watch_tests;
