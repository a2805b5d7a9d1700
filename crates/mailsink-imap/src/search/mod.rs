//! IMAP search criteria.
//!
//! [`SearchKey`] is the parsed criteria tree of a `SEARCH` command;
//! [`translate`] turns it into a [`Filter`] evaluated against stored
//! messages. Keys the filter cannot express produce
//! [`SearchError::NotSupported`], which the session answers with `NO`
//! instead of failing the connection.

mod translate;

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::SequenceSet;

pub use translate::{Field, Filter, translate, translate_at};

/// Search translation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The key has no equivalent filter.
    #[error("The criteria '{0}' is not supported")]
    NotSupported(String),
    /// The search text could not be compiled into a matcher.
    #[error("Invalid search text: {0}")]
    InvalidText(String),
}

/// Parsed IMAP search key.
///
/// IMAP has no explicit AND operator; space-separated keys and
/// parenthesized lists become [`SearchKey::And`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// Conjunction of keys.
    And(Vec<Self>),
    /// Message sequence numbers.
    SequenceSet(SequenceSet),
    /// Every message.
    All,
    /// `\Answered` set.
    Answered,
    /// BCC contains text.
    Bcc(String),
    /// Received before date.
    Before(NaiveDate),
    /// Body contains text.
    Body(String),
    /// CC contains text.
    Cc(String),
    /// `\Deleted` set.
    Deleted,
    /// `\Draft` set.
    Draft,
    /// `\Flagged` set.
    Flagged,
    /// From contains text.
    From(String),
    /// Named header contains text.
    Header(String, String),
    /// Keyword set.
    Keyword(String),
    /// Larger than size.
    Larger(u32),
    /// Recent and unseen.
    New,
    /// Negation.
    Not(Box<Self>),
    /// Not recent.
    Old,
    /// Older than the given number of seconds.
    Older(u32),
    /// Received on date.
    On(NaiveDate),
    /// Disjunction.
    Or(Box<Self>, Box<Self>),
    /// `\Recent` set.
    Recent,
    /// `\Seen` set.
    Seen,
    /// Date header before date.
    SentBefore(NaiveDate),
    /// Date header on date.
    SentOn(NaiveDate),
    /// Date header on or after date.
    SentSince(NaiveDate),
    /// Received on or after date.
    Since(NaiveDate),
    /// Smaller than size.
    Smaller(u32),
    /// Subject contains text.
    Subject(String),
    /// Header or body contains text.
    Text(String),
    /// To contains text.
    To(String),
    /// UID membership.
    Uid(SequenceSet),
    /// `\Answered` not set.
    Unanswered,
    /// `\Deleted` not set.
    Undeleted,
    /// `\Draft` not set.
    Undraft,
    /// `\Flagged` not set.
    Unflagged,
    /// Keyword not set.
    Unkeyword(String),
    /// `\Seen` not set.
    Unseen,
    /// Younger than the given number of seconds.
    Younger(u32),
}

impl SearchKey {
    /// Returns the IMAP keyword naming this key.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::And(_) => "AND",
            Self::SequenceSet(_) => "sequence set",
            Self::All => "ALL",
            Self::Answered => "ANSWERED",
            Self::Bcc(_) => "BCC",
            Self::Before(_) => "BEFORE",
            Self::Body(_) => "BODY",
            Self::Cc(_) => "CC",
            Self::Deleted => "DELETED",
            Self::Draft => "DRAFT",
            Self::Flagged => "FLAGGED",
            Self::From(_) => "FROM",
            Self::Header(..) => "HEADER",
            Self::Keyword(_) => "KEYWORD",
            Self::Larger(_) => "LARGER",
            Self::New => "NEW",
            Self::Not(_) => "NOT",
            Self::Old => "OLD",
            Self::Older(_) => "OLDER",
            Self::On(_) => "ON",
            Self::Or(..) => "OR",
            Self::Recent => "RECENT",
            Self::Seen => "SEEN",
            Self::SentBefore(_) => "SENTBEFORE",
            Self::SentOn(_) => "SENTON",
            Self::SentSince(_) => "SENTSINCE",
            Self::Since(_) => "SINCE",
            Self::Smaller(_) => "SMALLER",
            Self::Subject(_) => "SUBJECT",
            Self::Text(_) => "TEXT",
            Self::To(_) => "TO",
            Self::Uid(_) => "UID",
            Self::Unanswered => "UNANSWERED",
            Self::Undeleted => "UNDELETED",
            Self::Undraft => "UNDRAFT",
            Self::Unflagged => "UNFLAGGED",
            Self::Unkeyword(_) => "UNKEYWORD",
            Self::Unseen => "UNSEEN",
            Self::Younger(_) => "YOUNGER",
        }
    }
}
