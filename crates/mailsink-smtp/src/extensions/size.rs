use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::parameters::ParameterProcessor;
use crate::types::ReplyCode;

use super::{Extension, ExtensionProcessor, open_message};

/// `SIZE` (RFC 1870): advertises the limit and accepts `SIZE=` on MAIL FROM.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeExtension;

impl Extension for SizeExtension {
    fn create_processor(&self, connection: &mut Connection) -> Box<dyn ExtensionProcessor> {
        connection
            .mail_parameters_mut()
            .set_processor("SIZE", SizeParameter);
        Box::new(SizeProcessor)
    }
}

struct SizeProcessor;

impl ExtensionProcessor for SizeProcessor {
    fn ehlo_keywords(&self, connection: &Connection) -> Vec<String> {
        match connection.behaviour().maximum_message_size() {
            Some(max) => vec![format!("SIZE {max}")],
            None => vec!["SIZE".to_string()],
        }
    }
}

struct SizeParameter;

impl ParameterProcessor for SizeParameter {
    fn set_parameter(&self, connection: &mut Connection, _key: &str, value: &str) -> Result<()> {
        let size: u64 = value.parse().map_err(|_| {
            Error::response(ReplyCode::PARAMETER_ERROR, "Bad message size specified")
        })?;

        if connection
            .behaviour()
            .maximum_message_size()
            .is_some_and(|max| size > max)
        {
            return Err(Error::response(
                ReplyCode::EXCEEDED_STORAGE,
                "Message exceeds fixed size limit",
            ));
        }

        open_message(connection)?.set_declared_message_size(size);
        Ok(())
    }
}
