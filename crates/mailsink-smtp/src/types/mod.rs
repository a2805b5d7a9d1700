//! Core SMTP types.

mod extension;
mod reply;

pub use extension::AuthMechanism;
pub use reply::{ReplyClass, ReplyCode, SmtpResponse};
