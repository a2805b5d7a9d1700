//! MAIL FROM parameter processors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::ReplyCode;

/// Handles one `KEY=VALUE` parameter of MAIL FROM.
pub trait ParameterProcessor: Send + Sync {
    /// Applies the parameter to the open message.
    ///
    /// # Errors
    ///
    /// Returns the response to send if the value is unacceptable.
    fn set_parameter(&self, connection: &mut Connection, key: &str, value: &str) -> Result<()>;
}

/// Case-insensitive parameter-name registry.
#[derive(Clone, Default)]
pub struct ParameterProcessorMap {
    processors: HashMap<String, Arc<dyn ParameterProcessor>>,
}

impl std::fmt::Debug for ParameterProcessorMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.processors.keys()).finish()
    }
}

impl ParameterProcessorMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the processor for `key`.
    pub fn set_processor(&mut self, key: &str, processor: impl ParameterProcessor + 'static) {
        self.processors
            .insert(key.to_ascii_uppercase(), Arc::new(processor));
    }

    /// Looks up the processor for `key`.
    #[must_use]
    pub fn get_processor(&self, key: &str) -> Option<Arc<dyn ParameterProcessor>> {
        self.processors.get(&key.to_ascii_uppercase()).cloned()
    }

    /// Applies every parameter in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns `555` for an unregistered key, or the processor's error.
    pub fn process(connection: &mut Connection, parameters: &[String]) -> Result<()> {
        for parameter in parameters {
            let (key, value) = parameter.split_once('=').unwrap_or((parameter.as_str(), ""));
            let processor = connection
                .mail_parameters()
                .get_processor(key)
                .ok_or_else(|| {
                    Error::response(
                        ReplyCode::PARAMETERS_NOT_RECOGNIZED,
                        format!("Parameter {key} not supported"),
                    )
                })?;
            processor.set_parameter(connection, key, value)?;
        }
        Ok(())
    }
}
