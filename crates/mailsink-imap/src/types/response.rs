//! Server responses.

use std::fmt;

use bytes::Bytes;

use super::{Flag, flag_list};

/// Completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
}

impl Status {
    /// Returns the wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        }
    }
}

/// Response code in square brackets after the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// PERMANENTFLAGS: flags the client can change permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: target mailbox doesn't exist but can be created.
    TryCreate,
    /// UIDNEXT: next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY of the mailbox.
    UidValidity(u32),
    /// UNSEEN: first unseen message sequence number.
    Unseen(u32),
    /// APPENDUID: UID assigned to an appended message.
    AppendUid {
        /// UIDVALIDITY of the mailbox.
        uidvalidity: u32,
        /// UID of the appended message.
        uid: u32,
    },
    /// COPYUID: UIDs of copied messages.
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uidvalidity: u32,
        /// Source UIDs.
        source_uids: Vec<u32>,
        /// Destination UIDs.
        dest_uids: Vec<u32>,
    },
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermanentFlags(flags) => write!(f, "PERMANENTFLAGS {}", flag_list(flags)),
            Self::ReadOnly => f.write_str("READ-ONLY"),
            Self::ReadWrite => f.write_str("READ-WRITE"),
            Self::TryCreate => f.write_str("TRYCREATE"),
            Self::UidNext(uid) => write!(f, "UIDNEXT {uid}"),
            Self::UidValidity(validity) => write!(f, "UIDVALIDITY {validity}"),
            Self::Unseen(seq) => write!(f, "UNSEEN {seq}"),
            Self::AppendUid { uidvalidity, uid } => write!(f, "APPENDUID {uidvalidity} {uid}"),
            Self::CopyUid {
                uidvalidity,
                source_uids,
                dest_uids,
            } => write!(
                f,
                "COPYUID {uidvalidity} {} {}",
                uid_list(source_uids),
                uid_list(dest_uids)
            ),
        }
    }
}

fn uid_list(uids: &[u32]) -> String {
    uids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Outcome of one command: untagged data followed by the tagged completion.
///
/// Untagged entries are complete response lines without the trailing CRLF;
/// they may contain literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Completion status.
    pub status: Status,
    /// Optional response code.
    pub code: Option<ResponseCode>,
    /// Human-readable text.
    pub text: String,
    /// Untagged responses sent before the completion.
    pub untagged: Vec<Bytes>,
}

impl Response {
    /// Creates a response with no untagged data.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            text: text.into(),
            untagged: Vec::new(),
        }
    }

    /// `OK` completion.
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(Status::Ok, text)
    }

    /// `NO` completion.
    #[must_use]
    pub fn no(text: impl Into<String>) -> Self {
        Self::new(Status::No, text)
    }

    /// `BAD` completion.
    #[must_use]
    pub fn bad(text: impl Into<String>) -> Self {
        Self::new(Status::Bad, text)
    }

    /// Sets the response code.
    #[must_use]
    pub fn with_code(mut self, code: ResponseCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Queues an untagged line. The `* ` prefix is added here.
    pub fn push_untagged(&mut self, line: impl AsRef<str>) {
        self.untagged
            .push(Bytes::from(format!("* {}", line.as_ref())));
    }

    /// Queues a prebuilt untagged response, prefix included.
    pub fn push_untagged_bytes(&mut self, data: Bytes) {
        self.untagged.push(data);
    }

    /// Formats the tagged completion line.
    #[must_use]
    pub fn tagged_line(&self, tag: &str) -> String {
        match &self.code {
            Some(code) => format!("{tag} {} [{code}] {}", self.status.as_str(), self.text),
            None => format!("{tag} {} {}", self.status.as_str(), self.text),
        }
    }
}

/// Formats `value` as an IMAP quoted string.
#[must_use]
pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
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

    mod code_tests {
        use super::*;

        #[test]
        fn simple_codes() {
            assert_eq!(ResponseCode::ReadOnly.to_string(), "READ-ONLY");
            assert_eq!(ResponseCode::ReadWrite.to_string(), "READ-WRITE");
            assert_eq!(ResponseCode::TryCreate.to_string(), "TRYCREATE");
            assert_eq!(ResponseCode::UidNext(100).to_string(), "UIDNEXT 100");
            assert_eq!(ResponseCode::Unseen(42).to_string(), "UNSEEN 42");
        }

        #[test]
        fn permanent_flags() {
            let code = ResponseCode::PermanentFlags(vec![Flag::Seen, Flag::Deleted]);
            assert_eq!(code.to_string(), "PERMANENTFLAGS (\\Seen \\Deleted)");
        }

        #[test]
        fn append_and_copy_uid() {
            let append = ResponseCode::AppendUid {
                uidvalidity: 999,
                uid: 50,
            };
            assert_eq!(append.to_string(), "APPENDUID 999 50");

            let copy = ResponseCode::CopyUid {
                uidvalidity: 888,
                source_uids: vec![1, 2],
                dest_uids: vec![101, 102],
            };
            assert_eq!(copy.to_string(), "COPYUID 888 1,2 101,102");
        }
    }

    #[test]
    fn tagged_line_with_and_without_code() {
        assert_eq!(Response::ok("NOOP completed").tagged_line("a1"), "a1 OK NOOP completed");
        assert_eq!(
            Response::ok("SELECT completed")
                .with_code(ResponseCode::ReadOnly)
                .tagged_line("a2"),
            "a2 OK [READ-ONLY] SELECT completed"
        );
        assert_eq!(Response::bad("Oops").tagged_line("*"), "* BAD Oops");
    }

    #[test]
    fn untagged_lines_get_prefix() {
        let mut response = Response::ok("done");
        response.push_untagged("3 EXISTS");
        assert_eq!(response.untagged, vec![Bytes::from_static(b"* 3 EXISTS")]);
    }

    #[test]
    fn quoting_escapes() {
        assert_eq!(quoted("INBOX"), "\"INBOX\"");
        assert_eq!(quoted("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
