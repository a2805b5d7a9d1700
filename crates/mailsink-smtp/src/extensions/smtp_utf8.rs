use crate::connection::Connection;
use crate::error::Result;
use crate::parameters::ParameterProcessor;

use super::{Extension, ExtensionProcessor, StaticKeywords, open_message};

/// `SMTPUTF8` (RFC 6531): permits UTF-8 envelope addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmtpUtf8Extension;

impl Extension for SmtpUtf8Extension {
    fn create_processor(&self, connection: &mut Connection) -> Box<dyn ExtensionProcessor> {
        connection
            .mail_parameters_mut()
            .set_processor("SMTPUTF8", SmtpUtf8Parameter);
        Box::new(StaticKeywords(vec!["SMTPUTF8".to_string()]))
    }
}

struct SmtpUtf8Parameter;

impl ParameterProcessor for SmtpUtf8Parameter {
    fn set_parameter(&self, connection: &mut Connection, _key: &str, _value: &str) -> Result<()> {
        open_message(connection)?.set_eight_bit_transport(true);
        Ok(())
    }
}
