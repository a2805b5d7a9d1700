use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::parameters::ParameterProcessor;
use crate::types::ReplyCode;

use super::{Extension, ExtensionProcessor, StaticKeywords, open_message};

/// `8BITMIME` (RFC 6152): adds the `BODY=` MAIL FROM parameter.
#[derive(Debug, Default, Clone, Copy)]
pub struct EightBitMimeExtension;

impl Extension for EightBitMimeExtension {
    fn create_processor(&self, connection: &mut Connection) -> Box<dyn ExtensionProcessor> {
        connection
            .mail_parameters_mut()
            .set_processor("BODY", BodyParameter);
        Box::new(StaticKeywords(vec!["8BITMIME".to_string()]))
    }
}

struct BodyParameter;

impl ParameterProcessor for BodyParameter {
    fn set_parameter(&self, connection: &mut Connection, _key: &str, value: &str) -> Result<()> {
        let eight_bit = if value.eq_ignore_ascii_case("8BITMIME") {
            true
        } else if value.eq_ignore_ascii_case("7BIT") {
            false
        } else {
            return Err(Error::response(
                ReplyCode::PARAMETER_ERROR,
                "BODY parameter value invalid - must be either 7BIT or 8BITMIME",
            ));
        };
        open_message(connection)?.set_eight_bit_transport(eight_bit);
        Ok(())
    }
}
