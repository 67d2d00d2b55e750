pub mod config;
pub mod error;
pub mod handlers;
pub mod ip_join;
pub mod modules;
pub mod pipeline;
pub mod url_store;
pub mod worker;

use lookup_common::registry::Registry;

use crate::config::RunConfig;

/// A registry holding every handler and module shipped with the worker.
pub fn default_registry(config: &RunConfig) -> Registry {
    let mut registry = Registry::new();
    handlers::register_file_handlers(&mut registry);
    modules::register_modules(&mut registry, config);
    registry
}
