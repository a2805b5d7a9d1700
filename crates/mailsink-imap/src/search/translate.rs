//! Search-key to filter translation.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use mailsink_core::StoredMessage;
use mailsink_mime::encoding::decode_header_value;
use regex::{Regex, RegexBuilder};

use super::{SearchError, SearchKey};
use crate::types::SequenceSet;

/// Message text a [`Filter::Contains`] looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Envelope sender.
    From,
    /// Any recipient.
    To,
    /// Decoded subject.
    Subject,
    /// Body after the header block.
    Body,
    /// Entire raw message.
    Text,
}

/// Boolean expression over a stored message.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Always matches.
    True,
    /// Never matches.
    False,
    /// Every child matches; an empty list matches.
    And(Vec<Self>),
    /// Either child matches.
    Or(Box<Self>, Box<Self>),
    /// The child does not match.
    Not(Box<Self>),
    /// Unread flag equals the value.
    Unread(bool),
    /// Case-insensitive literal substring of a field.
    Contains(Field, Regex),
    /// Named header present and, with a pattern, containing it.
    Header(String, Option<Regex>),
    /// Received at or after the instant.
    ReceivedSince(DateTime<Utc>),
    /// Received strictly before the instant.
    ReceivedBefore(DateTime<Utc>),
    /// IMAP UID in the set.
    Uid(SequenceSet),
}

impl Filter {
    /// Evaluates the filter; `largest_uid` resolves `*` in UID sets.
    #[must_use]
    pub fn matches(&self, message: &StoredMessage, largest_uid: u32) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::And(children) => children.iter().all(|c| c.matches(message, largest_uid)),
            Self::Or(a, b) => a.matches(message, largest_uid) || b.matches(message, largest_uid),
            Self::Not(inner) => !inner.matches(message, largest_uid),
            Self::Unread(unread) => message.is_unread == *unread,
            Self::Contains(field, pattern) => match field {
                Field::From => pattern.is_match(&message.from),
                Field::To => message.to.iter().any(|to| pattern.is_match(to)),
                Field::Subject => pattern.is_match(&message.subject),
                Field::Body => pattern.is_match(&String::from_utf8_lossy(message.parsed().body())),
                Field::Text => pattern.is_match(&String::from_utf8_lossy(&message.data)),
            },
            Self::Header(name, pattern) => {
                let parsed = message.parsed();
                let values = parsed.headers().get_all(name);
                match pattern {
                    None => !values.is_empty(),
                    Some(pattern) => values
                        .iter()
                        .any(|v| pattern.is_match(&decode_header_value(v))),
                }
            }
            Self::ReceivedSince(at) => message.received_date >= *at,
            Self::ReceivedBefore(at) => message.received_date < *at,
            Self::Uid(set) => set.contains(message.imap_uid, largest_uid),
        }
    }

    /// Returns the messages that match, in order.
    #[must_use]
    pub fn select<'m>(&self, messages: &'m [StoredMessage]) -> Vec<&'m StoredMessage> {
        let largest = messages.iter().map(|m| m.imap_uid).max().unwrap_or(0);
        messages
            .iter()
            .filter(|m| self.matches(m, largest))
            .collect()
    }
}

/// Translates a search key using the current time for `YOUNGER`/`OLDER`.
///
/// # Errors
///
/// Returns [`SearchError::NotSupported`] for keys with no filter.
pub fn translate(key: &SearchKey) -> Result<Filter, SearchError> {
    translate_at(key, Utc::now())
}

/// Translates a search key relative to `now`.
///
/// # Errors
///
/// Returns [`SearchError::NotSupported`] for keys with no filter.
pub fn translate_at(key: &SearchKey, now: DateTime<Utc>) -> Result<Filter, SearchError> {
    Ok(match key {
        SearchKey::And(keys) => Filter::And(
            keys.iter()
                .map(|k| translate_at(k, now))
                .collect::<Result<_, _>>()?,
        ),
        SearchKey::Or(a, b) => Filter::Or(
            Box::new(translate_at(a, now)?),
            Box::new(translate_at(b, now)?),
        ),
        SearchKey::Not(inner) => Filter::Not(Box::new(translate_at(inner, now)?)),

        SearchKey::All | SearchKey::Old => Filter::True,
        SearchKey::Seen => Filter::Unread(false),
        SearchKey::Unseen | SearchKey::New => Filter::Unread(true),
        SearchKey::Draft
        | SearchKey::Flagged
        | SearchKey::Deleted
        | SearchKey::Answered
        | SearchKey::Recent => Filter::False,

        SearchKey::From(text) => Filter::Contains(Field::From, literal(text)?),
        SearchKey::To(text) => Filter::Contains(Field::To, literal(text)?),
        SearchKey::Subject(text) => Filter::Contains(Field::Subject, literal(text)?),
        SearchKey::Body(text) => Filter::Contains(Field::Body, literal(text)?),
        SearchKey::Text(text) => Filter::Contains(Field::Text, literal(text)?),
        SearchKey::Header(name, value) => Filter::Header(
            name.clone(),
            if value.is_empty() {
                None
            } else {
                Some(literal(value)?)
            },
        ),

        SearchKey::Since(date) => Filter::ReceivedSince(start_of(*date)),
        SearchKey::Before(date) => Filter::ReceivedBefore(start_of(*date)),
        SearchKey::On(date) => {
            let since = Filter::ReceivedSince(start_of(*date));
            match date.succ_opt() {
                Some(next) => Filter::And(vec![since, Filter::ReceivedBefore(start_of(next))]),
                None => since,
            }
        }
        SearchKey::Younger(seconds) => {
            Filter::ReceivedSince(now - TimeDelta::seconds(i64::from(*seconds)))
        }
        SearchKey::Older(seconds) => {
            Filter::ReceivedBefore(now - TimeDelta::seconds(i64::from(*seconds)))
        }
        SearchKey::Uid(set) => Filter::Uid(set.clone()),

        other => return Err(SearchError::NotSupported(other.name().to_string())),
    })
}

/// Builds a case-insensitive pattern that matches `text` literally.
fn literal(text: &str) -> Result<Regex, SearchError> {
    RegexBuilder::new(&regex::escape(text))
        .case_insensitive(true)
        .build()
        .map_err(|e| SearchError::InvalidText(e.to_string()))
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
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

    fn message(id: i64, from: &str, unread: bool, received: DateTime<Utc>) -> StoredMessage {
        let data = format!(
            "From: {from}\r\nTo: team@example.com\r\nSubject: Report {id}\r\nX-Trace: run-{id}\r\n\r\nBody for 100% of cases\r\n"
        );
        StoredMessage {
            id,
            mailbox: "Default".to_string(),
            folder: "INBOX".to_string(),
            imap_uid: u32::try_from(id).unwrap(),
            from: from.to_string(),
            to: vec!["team@example.com".to_string()],
            subject: format!("Report {id}"),
            received_date: received,
            is_unread: unread,
            secure_connection: false,
            data: data.into_bytes(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn mailbox() -> Vec<StoredMessage> {
        vec![
            message(1, "alice@example.com", true, now() - TimeDelta::days(3)),
            message(2, "bob@example.com", false, now() - TimeDelta::hours(2)),
            message(3, "Alice@Other.org", false, now() - TimeDelta::minutes(5)),
        ]
    }

    fn ids(key: &SearchKey) -> Vec<i64> {
        let messages = mailbox();
        let filter = translate_at(key, now()).unwrap();
        filter.select(&messages).iter().map(|m| m.id).collect()
    }

    mod combinator_tests {
        use super::*;

        #[test]
        fn group_is_conjunction() {
            let key = SearchKey::And(vec![SearchKey::Unseen, SearchKey::From("alice".into())]);
            assert_eq!(ids(&key), vec![1]);
        }

        #[test]
        fn empty_group_matches_all() {
            assert_eq!(ids(&SearchKey::And(vec![])), vec![1, 2, 3]);
        }

        #[test]
        fn or_is_union() {
            let key = SearchKey::Or(
                Box::new(SearchKey::Seen),
                Box::new(SearchKey::From("alice@example".into())),
            );
            assert_eq!(ids(&key), vec![1, 2, 3]);
        }

        #[test]
        fn not_seen_equals_unseen() {
            let not_seen = SearchKey::Not(Box::new(SearchKey::Seen));
            assert_eq!(ids(&not_seen), ids(&SearchKey::Unseen));
        }

        #[test]
        fn unsupported_child_fails_whole_tree() {
            let key = SearchKey::And(vec![SearchKey::All, SearchKey::Larger(10)]);
            assert_eq!(
                translate_at(&key, now()).unwrap_err(),
                SearchError::NotSupported("LARGER".to_string())
            );
        }
    }

    mod leaf_tests {
        use super::*;

        #[test]
        fn untracked_flags_match_nothing() {
            assert!(ids(&SearchKey::Draft).is_empty());
            assert!(ids(&SearchKey::Flagged).is_empty());
            assert!(ids(&SearchKey::Deleted).is_empty());
            assert!(ids(&SearchKey::Answered).is_empty());
        }

        #[test]
        fn text_match_is_case_insensitive() {
            assert_eq!(ids(&SearchKey::From("ALICE".into())), vec![1, 3]);
            assert_eq!(ids(&SearchKey::Subject("report 2".into())), vec![2]);
            assert_eq!(ids(&SearchKey::To("TEAM@".into())), vec![1, 2, 3]);
        }

        #[test]
        fn wildcards_are_literal() {
            assert!(ids(&SearchKey::From("a%".into())).is_empty());
            assert!(ids(&SearchKey::From("a?ice".into())).is_empty());
            assert!(ids(&SearchKey::From(".*".into())).is_empty());
            assert_eq!(ids(&SearchKey::Body("100%".into())), vec![1, 2, 3]);
        }

        #[test]
        fn header_and_text() {
            assert_eq!(ids(&SearchKey::Header("x-trace".into(), "RUN-3".into())), vec![3]);
            assert_eq!(ids(&SearchKey::Header("X-Trace".into(), String::new())), vec![1, 2, 3]);
            assert!(ids(&SearchKey::Header("X-Missing".into(), String::new())).is_empty());
            assert_eq!(ids(&SearchKey::Text("subject: report 1".into())), vec![1]);
            assert!(ids(&SearchKey::Body("Subject".into())).is_empty());
        }

        #[test]
        fn dates() {
            let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
            let earlier = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
            assert_eq!(ids(&SearchKey::Since(today)), vec![2, 3]);
            assert_eq!(ids(&SearchKey::Before(today)), vec![1]);
            assert_eq!(ids(&SearchKey::On(earlier)), vec![1]);
        }

        #[test]
        fn relative_ages() {
            assert_eq!(ids(&SearchKey::Younger(600)), vec![3]);
            assert_eq!(ids(&SearchKey::Older(600)), vec![1, 2]);
        }

        #[test]
        fn uid_sets() {
            let set = SequenceSet::parse("2:*").unwrap();
            assert_eq!(ids(&SearchKey::Uid(set)), vec![2, 3]);
        }

        #[test]
        fn new_and_old() {
            assert_eq!(ids(&SearchKey::New), vec![1]);
            assert_eq!(ids(&SearchKey::Old), vec![1, 2, 3]);
        }

        #[test]
        fn sequence_sets_are_not_supported() {
            let key = SearchKey::SequenceSet(SequenceSet::parse("1").unwrap());
            assert!(matches!(
                translate_at(&key, now()),
                Err(SearchError::NotSupported(_))
            ));
        }
    }
}
