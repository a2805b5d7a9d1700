//! Snapshot of the selected mailbox.
//!
//! Sequence numbers are positions in the snapshot, not in the repository.
//! The snapshot only changes when the session polls (NOOP, CHECK, EXPUNGE),
//! so numbers stay stable between those points as IMAP requires.

use chrono::{DateTime, Utc};
use mailsink_core::StoredMessage;

use crate::types::{Flag, SequenceSet};

/// Per-message state the session tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Repository id.
    pub id: i64,
    /// IMAP UID.
    pub uid: u32,
    /// Current flags. Only `\Seen` is backed by the repository.
    pub flags: Vec<Flag>,
    /// RFC822 size.
    pub size: usize,
    /// When the message was received.
    pub internal_date: DateTime<Utc>,
}

impl MessageInfo {
    /// Builds the session view of a stored message.
    #[must_use]
    pub fn from_stored(message: &StoredMessage) -> Self {
        let flags = if message.is_unread {
            Vec::new()
        } else {
            vec![Flag::Seen]
        };
        Self {
            id: message.id,
            uid: message.imap_uid,
            flags,
            size: message.size(),
            internal_date: message.received_date,
        }
    }

    /// Returns true if `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.contains(&Flag::Seen)
    }
}

/// The currently selected folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMailbox {
    /// Name as the client gave it.
    pub name: String,
    /// Folder path in the repository.
    pub folder: String,
    /// UIDVALIDITY.
    pub uid_validity: u32,
    /// Selected with EXAMINE.
    pub read_only: bool,
    /// Messages in sequence order.
    pub messages: Vec<MessageInfo>,
}

impl SelectedMailbox {
    /// Creates a snapshot from the repository listing.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        folder: impl Into<String>,
        uid_validity: u32,
        read_only: bool,
        messages: &[StoredMessage],
    ) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            uid_validity,
            read_only,
            messages: messages.iter().map(MessageInfo::from_stored).collect(),
        }
    }

    /// Number of messages.
    #[must_use]
    pub fn exists(&self) -> u32 {
        u32::try_from(self.messages.len()).unwrap_or(u32::MAX)
    }

    /// Largest UID in the snapshot, 0 when empty.
    #[must_use]
    pub fn largest_uid(&self) -> u32 {
        self.messages.iter().map(|m| m.uid).max().unwrap_or(0)
    }

    /// Next UID the repository is expected to assign.
    #[must_use]
    pub fn uid_next(&self) -> u32 {
        self.largest_uid().saturating_add(1)
    }

    /// Sequence number of the first unseen message.
    #[must_use]
    pub fn first_unseen(&self) -> Option<u32> {
        self.messages
            .iter()
            .position(|m| !m.is_seen())
            .and_then(|i| u32::try_from(i + 1).ok())
    }

    /// Sequence number of the message with `uid`.
    #[must_use]
    pub fn sequence_of_uid(&self, uid: u32) -> Option<u32> {
        self.messages
            .iter()
            .position(|m| m.uid == uid)
            .and_then(|i| u32::try_from(i + 1).ok())
    }

    /// Resolves a set to `(sequence number, index)` pairs in sequence order.
    ///
    /// With `uid`, the set holds UIDs and `*` is the largest UID; otherwise
    /// it holds sequence numbers and `*` is the message count.
    #[must_use]
    pub fn resolve(&self, set: &SequenceSet, uid: bool) -> Vec<(u32, usize)> {
        let largest = if uid {
            self.largest_uid()
        } else {
            self.exists()
        };
        (1u32..)
            .zip(self.messages.iter().enumerate())
            .filter(|(seq, (_, info))| {
                let n = if uid { info.uid } else { *seq };
                set.contains(n, largest)
            })
            .map(|(seq, (index, _))| (seq, index))
            .collect()
    }

    /// Reconciles the snapshot with a fresh listing.
    ///
    /// Returns the untagged `EXPUNGE` and `EXISTS` lines (without the `* `
    /// prefix) to send. Expunges are reported highest first, so each number
    /// is valid at the moment it is sent.
    pub fn sync(&mut self, current: &[StoredMessage]) -> Vec<String> {
        let mut updates = Vec::new();

        for index in (0..self.messages.len()).rev() {
            let id = self.messages[index].id;
            match current.iter().find(|m| m.id == id) {
                Some(stored) => {
                    if !stored.is_unread && !self.messages[index].is_seen() {
                        self.messages[index].flags.push(Flag::Seen);
                    }
                }
                None => {
                    self.messages.remove(index);
                    updates.push(format!("{} EXPUNGE", index + 1));
                }
            }
        }

        let before = self.messages.len();
        for stored in current {
            if !self.messages.iter().any(|m| m.id == stored.id) {
                self.messages.push(MessageInfo::from_stored(stored));
            }
        }
        if self.messages.len() != before || !updates.is_empty() {
            updates.push(format!("{} EXISTS", self.exists()));
        }

        updates
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
    use chrono::TimeZone;

    fn stored(id: i64, unread: bool) -> StoredMessage {
        StoredMessage {
            id,
            mailbox: "Default".to_string(),
            folder: "INBOX".to_string(),
            imap_uid: u32::try_from(id).unwrap(),
            from: "a@example.com".to_string(),
            to: vec!["b@example.com".to_string()],
            subject: String::new(),
            received_date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            is_unread: unread,
            secure_connection: false,
            data: b"Subject: x\r\n\r\nbody\r\n".to_vec(),
        }
    }

    fn snapshot(ids: &[(i64, bool)]) -> SelectedMailbox {
        let messages: Vec<_> = ids.iter().map(|&(id, unread)| stored(id, unread)).collect();
        SelectedMailbox::new("INBOX", "INBOX", 1, false, &messages)
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn sequence_numbers() {
            let selected = snapshot(&[(10, true), (20, true), (30, true)]);
            let set = SequenceSet::parse("2:*").unwrap();
            assert_eq!(selected.resolve(&set, false), vec![(2, 1), (3, 2)]);
        }

        #[test]
        fn uids_with_star() {
            let selected = snapshot(&[(10, true), (20, true), (30, true)]);
            let set = SequenceSet::parse("15:*").unwrap();
            assert_eq!(selected.resolve(&set, true), vec![(2, 1), (3, 2)]);

            let set = SequenceSet::parse("10,30").unwrap();
            assert_eq!(selected.resolve(&set, true), vec![(1, 0), (3, 2)]);
        }

        #[test]
        fn out_of_range() {
            let selected = snapshot(&[(10, true)]);
            let set = SequenceSet::parse("5").unwrap();
            assert!(selected.resolve(&set, false).is_empty());
        }
    }

    #[test]
    fn flags_follow_unread_state() {
        let selected = snapshot(&[(1, true), (2, false)]);
        assert!(!selected.messages[0].is_seen());
        assert!(selected.messages[1].is_seen());
        assert_eq!(selected.first_unseen(), Some(1));
        assert_eq!(selected.uid_next(), 3);
        assert_eq!(selected.sequence_of_uid(2), Some(2));
    }

    mod sync_tests {
        use super::*;

        #[test]
        fn unchanged_reports_nothing() {
            let mut selected = snapshot(&[(1, true), (2, true)]);
            let updates = selected.sync(&[stored(1, true), stored(2, true)]);
            assert!(updates.is_empty());
        }

        #[test]
        fn expunges_are_reported_highest_first() {
            let mut selected = snapshot(&[(1, true), (2, true), (3, true), (4, true)]);
            let updates = selected.sync(&[stored(1, true), stored(3, true)]);
            assert_eq!(updates, vec!["4 EXPUNGE", "2 EXPUNGE", "2 EXISTS"]);
            assert_eq!(selected.messages.len(), 2);
        }

        #[test]
        fn new_messages_are_appended() {
            let mut selected = snapshot(&[(1, true)]);
            let updates = selected.sync(&[stored(1, false), stored(5, true)]);
            assert_eq!(updates, vec!["2 EXISTS"]);
            assert!(selected.messages[0].is_seen());
            assert_eq!(selected.messages[1].uid, 5);
        }
    }
}
