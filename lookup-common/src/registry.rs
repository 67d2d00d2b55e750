use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::handlers::{HandlerConfig, HandlerError, InputHandler, OutputHandler};
use crate::lookup::LookupModule;

pub type InputHandlerBuilder =
    Arc<dyn Fn(&HandlerConfig) -> Result<Box<dyn InputHandler>, HandlerError> + Send + Sync>;

pub type OutputHandlerBuilder =
    Arc<dyn Fn(&HandlerConfig) -> Result<Arc<dyn OutputHandler>, HandlerError> + Send + Sync>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("input handler not found: {0}")]
    InputHandlerNotFound(String),
    #[error("output handler not found: {0}")]
    OutputHandlerNotFound(String),
    #[error("lookup module not found: {0}")]
    ModuleNotFound(String),
}

/// Named input handlers, output handlers and lookup modules.
///
/// Everything is registered while the process starts, through `&mut self`, and the
/// registry is only shared by reference afterwards, so lookups never race registration.
#[derive(Default)]
pub struct Registry {
    input_handlers: HashMap<String, InputHandlerBuilder>,
    output_handlers: HashMap<String, OutputHandlerBuilder>,
    modules: HashMap<String, Arc<dyn LookupModule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder that initializes an input handler from the run's settings.
    ///
    /// # Panics
    ///
    /// When `name` is already taken.
    pub fn register_input_handler<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&HandlerConfig) -> Result<Box<dyn InputHandler>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        if self
            .input_handlers
            .insert(name.to_owned(), Arc::new(builder))
            .is_some()
        {
            panic!("input handler {name} registered twice");
        }
    }

    /// # Panics
    ///
    /// When `name` is already taken.
    pub fn register_output_handler<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&HandlerConfig) -> Result<Arc<dyn OutputHandler>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        if self
            .output_handlers
            .insert(name.to_owned(), Arc::new(builder))
            .is_some()
        {
            panic!("output handler {name} registered twice");
        }
    }

    /// # Panics
    ///
    /// When `name` is already taken.
    pub fn register_module(&mut self, name: &str, module: Arc<dyn LookupModule>) {
        if self.modules.insert(name.to_owned(), module).is_some() {
            panic!("lookup module {name} registered twice");
        }
    }

    pub fn input_handler(&self, name: &str) -> Result<InputHandlerBuilder, RegistryError> {
        self.input_handlers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::InputHandlerNotFound(name.to_owned()))
    }

    pub fn output_handler(&self, name: &str) -> Result<OutputHandlerBuilder, RegistryError> {
        self.output_handlers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::OutputHandlerNotFound(name.to_owned()))
    }

    pub fn module(&self, name: &str) -> Result<Arc<dyn LookupModule>, RegistryError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::input::InputItem;
    use crate::lookup::{LookupError, RoutineFactory};

    struct NoInput;

    #[async_trait]
    impl InputHandler for NoInput {
        async fn feed_channel(
            &mut self,
            _items: mpsc::Sender<InputItem>,
            _zonefile_input: bool,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    struct NoModule;

    impl LookupModule for NoModule {
        fn make_routine_factory(
            &self,
            thread_id: usize,
        ) -> Result<Box<dyn RoutineFactory>, LookupError> {
            Err(LookupError::RoutineFactory {
                thread_id,
                reason: "unusable".to_owned(),
            })
        }
    }

    fn no_input(_: &HandlerConfig) -> Result<Box<dyn InputHandler>, HandlerError> {
        Ok(Box::new(NoInput))
    }

    #[test]
    fn test_lookup_of_registered_names() {
        let mut registry = Registry::new();
        registry.register_input_handler("none", no_input);
        registry.register_module("none", Arc::new(NoModule));

        assert!(registry.input_handler("none").is_ok());
        assert!(registry.module("none").is_ok());
        assert_eq!(
            registry.output_handler("none").err(),
            Some(RegistryError::OutputHandlerNotFound("none".to_owned()))
        );
        assert_eq!(
            registry.module("missing").err(),
            Some(RegistryError::ModuleNotFound("missing".to_owned()))
        );
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let mut registry = Registry::new();
        registry.register_input_handler("none", no_input);
        registry.register_input_handler("none", no_input);
    }
}
