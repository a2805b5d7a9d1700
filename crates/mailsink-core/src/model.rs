//! Domain models for captured mail.

use chrono::{DateTime, Utc};
use mailsink_mime::Message;

/// Name of the root folder every mailbox has.
pub const INBOX: &str = "INBOX";

/// A message held by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Repository identifier, unique across mailboxes.
    pub id: i64,
    /// Owning mailbox name.
    pub mailbox: String,
    /// Folder path inside the mailbox.
    pub folder: String,
    /// IMAP UID.
    pub imap_uid: u32,
    /// Envelope sender.
    pub from: String,
    /// Envelope recipients.
    pub to: Vec<String>,
    /// Decoded subject.
    pub subject: String,
    /// When the message was received.
    pub received_date: DateTime<Utc>,
    /// Whether the message is still unread.
    pub is_unread: bool,
    /// Whether it arrived over TLS.
    pub secure_connection: bool,
    /// Raw message bytes.
    pub data: Vec<u8>,
}

impl StoredMessage {
    /// Size of the raw message in octets.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Stable unique-id listing token for POP3 `UIDL`.
    ///
    /// Derived from the repository id and size, never from the session's
    /// sequence numbers.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{:x}-{:x}", self.id, self.data.len())
    }

    /// Parses the raw data's header block.
    #[must_use]
    pub fn parsed(&self) -> Message<'_> {
        Message::parse(&self.data)
    }
}

/// A message about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Envelope sender.
    pub from: String,
    /// Envelope recipients.
    pub to: Vec<String>,
    /// Subject to index under.
    pub subject: String,
    /// When the message was received.
    pub received_date: DateTime<Utc>,
    /// Whether it arrived over TLS.
    pub secure_connection: bool,
    /// Raw message bytes.
    pub data: Vec<u8>,
}

impl NewMessage {
    /// Builds a message from an SMTP envelope and raw data.
    ///
    /// The subject comes from the data; the addresses come from the envelope.
    #[must_use]
    pub fn from_envelope(
        from: impl Into<String>,
        to: Vec<String>,
        data: Vec<u8>,
        secure_connection: bool,
    ) -> Self {
        let subject = Message::parse(&data).subject().unwrap_or_default();
        Self {
            from: from.into(),
            to,
            subject,
            received_date: Utc::now(),
            secure_connection,
            data,
        }
    }

    /// Builds a message whose envelope is derived entirely from its headers.
    #[must_use]
    pub fn from_data(data: Vec<u8>) -> Self {
        let parsed = Message::parse(&data);
        let from = parsed.from().unwrap_or_default();
        let to = parsed.to();
        let subject = parsed.subject().unwrap_or_default();
        Self {
            from,
            to,
            subject,
            received_date: Utc::now(),
            secure_connection: false,
            data,
        }
    }
}

/// A mailbox: the per-user message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Repository identifier.
    pub id: i64,
    /// Mailbox name.
    pub name: String,
}

/// A folder inside a mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Repository identifier.
    pub id: i64,
    /// Owning mailbox name.
    pub mailbox: String,
    /// `/`-separated folder path.
    pub path: String,
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
    fn test_from_data_derives_envelope() {
        let msg = NewMessage::from_data(
            b"From: a@b.com\r\nTo: c@d.com\r\nSubject: Hi\r\n\r\nbody".to_vec(),
        );
        assert_eq!(msg.from, "a@b.com");
        assert_eq!(msg.to, vec!["c@d.com".to_string()]);
        assert_eq!(msg.subject, "Hi");
    }

    #[test]
    fn test_from_envelope_keeps_envelope() {
        let msg = NewMessage::from_envelope(
            "env@b.com",
            vec!["rcpt@d.com".to_string()],
            b"From: other@b.com\r\nSubject: S\r\n\r\n".to_vec(),
            true,
        );
        assert_eq!(msg.from, "env@b.com");
        assert_eq!(msg.subject, "S");
        assert!(msg.secure_connection);
    }
}
