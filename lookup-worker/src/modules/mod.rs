pub mod system;

use std::sync::Arc;

use lookup_common::registry::Registry;

use crate::config::RunConfig;

pub use system::{SystemLookupModule, SYSTEM_MODULE};

/// Register the lookup modules shipped with the worker.
pub fn register_modules(registry: &mut Registry, config: &RunConfig) {
    registry.register_module(
        SYSTEM_MODULE,
        Arc::new(SystemLookupModule::new(config.timeout, config.retries)),
    );
}
