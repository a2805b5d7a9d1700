//! Optional SMTP service extensions.
//!
//! An [`Extension`] is a factory held by the server behaviour. For every
//! connection it creates an [`ExtensionProcessor`], registering whatever
//! verbs and MAIL FROM parameters it needs on the way. The processor then
//! contributes its EHLO keywords for the lifetime of the connection.

mod auth;
mod eight_bit_mime;
mod size;
mod smtp_utf8;
mod starttls;

pub use auth::{AuthExtension, AuthVerb};
pub use eight_bit_mime::EightBitMimeExtension;
pub use size::SizeExtension;
pub use smtp_utf8::SmtpUtf8Extension;
pub use starttls::{StartTlsExtension, StartTlsVerb};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::message::MessageBuilder;
use crate::types::ReplyCode;

/// Per-server factory for an extension.
pub trait Extension: Send + Sync {
    /// Registers the extension on `connection` and returns its processor.
    fn create_processor(&self, connection: &mut Connection) -> Box<dyn ExtensionProcessor>;
}

/// Per-connection state of an extension.
pub trait ExtensionProcessor: Send + Sync {
    /// EHLO keyword lines to advertise right now.
    fn ehlo_keywords(&self, connection: &Connection) -> Vec<String>;
}

/// AUTH, STARTTLS, SIZE, 8BITMIME and SMTPUTF8 with system randomness.
#[must_use]
pub fn default_extensions() -> Vec<Box<dyn Extension>> {
    vec![
        Box::new(EightBitMimeExtension),
        Box::new(SizeExtension),
        Box::new(StartTlsExtension),
        Box::new(AuthExtension::default()),
        Box::new(SmtpUtf8Extension),
    ]
}

/// Extension processor with a fixed keyword list.
#[derive(Debug, Clone)]
struct StaticKeywords(Vec<String>);

impl ExtensionProcessor for StaticKeywords {
    fn ehlo_keywords(&self, _connection: &Connection) -> Vec<String> {
        self.0.clone()
    }
}

fn open_message(connection: &mut Connection) -> Result<&mut MessageBuilder> {
    connection
        .current_message_mut()
        .ok_or_else(|| Error::response(ReplyCode::BAD_SEQUENCE, "No message in progress"))
}
