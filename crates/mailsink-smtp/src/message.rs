//! In-transit messages.

use chrono::{DateTime, Utc};

/// A message accepted by DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Envelope sender; empty for the null reverse-path.
    pub from: String,
    /// Envelope recipients in RCPT order.
    pub recipients: Vec<String>,
    /// When MAIL FROM opened the transaction.
    pub received_date: DateTime<Utc>,
    /// Whether the session was encrypted.
    pub secure_connection: bool,
    /// Whether SMTPUTF8 or BODY=8BITMIME was requested.
    pub eight_bit_transport: bool,
    /// SIZE parameter from MAIL FROM.
    pub declared_message_size: Option<u64>,
    /// Message content after dot-unstuffing.
    pub data: Vec<u8>,
}

/// Accumulates an open transaction between MAIL FROM and the end of DATA.
///
/// Data is appended with [`write`](Self::write) and the builder is sealed by
/// [`finish`](Self::finish); dropping it aborts the transaction.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: String,
    recipients: Vec<String>,
    received_date: DateTime<Utc>,
    secure_connection: bool,
    eight_bit_transport: bool,
    declared_message_size: Option<u64>,
    data: Vec<u8>,
}

impl MessageBuilder {
    /// Opens a transaction.
    #[must_use]
    pub fn new(secure_connection: bool) -> Self {
        Self {
            received_date: Utc::now(),
            secure_connection,
            ..Self::default()
        }
    }

    /// Returns the envelope sender.
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Sets the envelope sender.
    pub fn set_from(&mut self, from: impl Into<String>) {
        self.from = from.into();
    }

    /// Returns the recipients so far.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Adds a recipient.
    pub fn add_recipient(&mut self, recipient: impl Into<String>) {
        self.recipients.push(recipient.into());
    }

    /// Returns true if 8-bit transport was requested.
    #[must_use]
    pub const fn eight_bit_transport(&self) -> bool {
        self.eight_bit_transport
    }

    /// Marks the transaction as 8-bit.
    pub const fn set_eight_bit_transport(&mut self, value: bool) {
        self.eight_bit_transport = value;
    }

    /// Returns the declared size.
    #[must_use]
    pub const fn declared_message_size(&self) -> Option<u64> {
        self.declared_message_size
    }

    /// Records the SIZE parameter.
    pub const fn set_declared_message_size(&mut self, size: u64) {
        self.declared_message_size = Some(size);
    }

    /// Appends message data.
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Returns the number of data bytes written so far.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Seals the transaction.
    #[must_use]
    pub fn finish(self) -> Message {
        Message {
            from: self.from,
            recipients: self.recipients,
            received_date: self.received_date,
            secure_connection: self.secure_connection,
            eight_bit_transport: self.eight_bit_transport,
            declared_message_size: self.declared_message_size,
            data: self.data,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message() {
        let mut builder = MessageBuilder::new(true);
        builder.set_from("a@b.com");
        builder.add_recipient("c@d.com");
        builder.set_declared_message_size(42);
        builder.write(b"Subject: x\r\n");
        builder.write(b"\r\nbody");
        assert_eq!(builder.data_len(), 18);

        let message = builder.finish();
        assert_eq!(message.from, "a@b.com");
        assert_eq!(message.recipients, vec!["c@d.com"]);
        assert_eq!(message.declared_message_size, Some(42));
        assert!(message.secure_connection);
        assert_eq!(message.data, b"Subject: x\r\n\r\nbody");
    }
}
