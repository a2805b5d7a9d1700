//! Client command parser.

use crate::parser::lexer::{Lexer, Token};
use crate::parser::search;
use crate::search::SearchKey;
use crate::types::{Flag, SequenceSet, StoreMode};
use crate::Result;

/// A tagged client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Client-chosen tag echoed in the completion response.
    pub tag: String,
    /// The command and its arguments.
    pub kind: CommandKind,
}

/// Attribute requested by `STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusItem {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
}

impl StatusItem {
    /// Returns the IMAP name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// Body section of a `BODY[...]` fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// `[]`: the whole message.
    Full,
    /// `[HEADER]`.
    Header,
    /// `[TEXT]`.
    Text,
}

impl Section {
    /// Returns the text between the brackets.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "",
            Self::Header => "HEADER",
            Self::Text => "TEXT",
        }
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// UID.
    Uid,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Body section; `peek` leaves `\Seen` alone.
    Body {
        /// Section specifier.
        section: Section,
        /// `BODY.PEEK`.
        peek: bool,
    },
    /// RFC822 (whole message, sets `\Seen`).
    Rfc822,
    /// RFC822.HEADER.
    Rfc822Header,
    /// RFC822.TEXT (sets `\Seen`).
    Rfc822Text,
}

impl FetchAttribute {
    /// Returns true if fetching this item marks the message read.
    #[must_use]
    pub const fn sets_seen(self) -> bool {
        matches!(
            self,
            Self::Body { peek: false, .. } | Self::Rfc822 | Self::Rfc822Text
        )
    }
}

/// Parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// CAPABILITY.
    Capability,
    /// NOOP.
    Noop,
    /// LOGOUT.
    Logout,
    /// LOGIN.
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// SELECT or EXAMINE.
    Select {
        /// Folder name.
        mailbox: String,
        /// EXAMINE.
        read_only: bool,
    },
    /// CREATE.
    Create {
        /// Folder name.
        mailbox: String,
    },
    /// DELETE.
    Delete {
        /// Folder name.
        mailbox: String,
    },
    /// SUBSCRIBE or UNSUBSCRIBE.
    Subscribe {
        /// Folder name.
        mailbox: String,
        /// False for UNSUBSCRIBE.
        subscribe: bool,
    },
    /// LIST or LSUB.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern with `*`/`%` wildcards.
        pattern: String,
        /// LSUB.
        subscribed: bool,
    },
    /// NAMESPACE.
    Namespace,
    /// STATUS.
    Status {
        /// Folder name.
        mailbox: String,
        /// Requested attributes.
        items: Vec<StatusItem>,
    },
    /// APPEND.
    Append {
        /// Target folder.
        mailbox: String,
        /// Initial flags.
        flags: Vec<Flag>,
        /// Raw message from the literal.
        data: Vec<u8>,
    },
    /// CHECK.
    Check,
    /// CLOSE.
    Close,
    /// EXPUNGE.
    Expunge,
    /// SEARCH or UID SEARCH.
    Search {
        /// Criteria tree.
        criteria: SearchKey,
        /// Return UIDs.
        uid: bool,
    },
    /// FETCH or UID FETCH.
    Fetch {
        /// Messages.
        set: SequenceSet,
        /// Requested items.
        items: Vec<FetchAttribute>,
        /// `set` holds UIDs.
        uid: bool,
    },
    /// STORE or UID STORE.
    Store {
        /// Messages.
        set: SequenceSet,
        /// How to combine flags.
        mode: StoreMode,
        /// `.SILENT`.
        silent: bool,
        /// Flags.
        flags: Vec<Flag>,
        /// `set` holds UIDs.
        uid: bool,
    },
    /// COPY or UID COPY.
    Copy {
        /// Messages.
        set: SequenceSet,
        /// Target folder.
        mailbox: String,
        /// `set` holds UIDs.
        uid: bool,
    },
}

impl CommandKind {
    /// Returns the command name used in completion responses.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select {
                read_only: false, ..
            } => "SELECT",
            Self::Select { read_only: true, .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Subscribe {
                subscribe: true, ..
            } => "SUBSCRIBE",
            Self::Subscribe {
                subscribe: false, ..
            } => "UNSUBSCRIBE",
            Self::List {
                subscribed: false, ..
            } => "LIST",
            Self::List {
                subscribed: true, ..
            } => "LSUB",
            Self::Namespace => "NAMESPACE",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
        }
    }
}

/// Parser for complete client commands.
pub struct CommandParser;

impl CommandParser {
    /// Parses one command, literals already spliced in.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] for malformed or unknown commands.
    pub fn parse(input: &[u8]) -> Result<Command> {
        let mut lexer = Lexer::new(input);
        let tag = lexer.read_atom_string()?.to_string();
        lexer.expect_space()?;

        let name = lexer.read_atom_string()?.to_ascii_uppercase();
        let kind = if name == "UID" {
            lexer.expect_space()?;
            let sub = lexer.read_atom_string()?.to_ascii_uppercase();
            parse_kind(&mut lexer, &sub, true)?
        } else {
            parse_kind(&mut lexer, &name, false)?
        };

        lexer.expect_end()?;
        Ok(Command { tag, kind })
    }

    /// Returns the tag of a command line, if it has a usable one.
    #[must_use]
    pub fn tag(input: &[u8]) -> Option<String> {
        let mut lexer = Lexer::new(input);
        match lexer.next_token() {
            Ok(Token::Atom(tag)) => Some(tag.to_string()),
            Ok(Token::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn parse_kind(lexer: &mut Lexer<'_>, name: &str, uid: bool) -> Result<CommandKind> {
    let kind = match (name, uid) {
        ("CAPABILITY", false) => CommandKind::Capability,
        ("NOOP", false) => CommandKind::Noop,
        ("LOGOUT", false) => CommandKind::Logout,
        ("NAMESPACE", false) => CommandKind::Namespace,
        ("CHECK", false) => CommandKind::Check,
        ("CLOSE", false) => CommandKind::Close,
        ("EXPUNGE", false) => CommandKind::Expunge,
        ("LOGIN", false) => {
            let username = argument(lexer)?;
            let password = argument(lexer)?;
            CommandKind::Login { username, password }
        }
        ("SELECT" | "EXAMINE", false) => CommandKind::Select {
            mailbox: argument(lexer)?,
            read_only: name == "EXAMINE",
        },
        ("CREATE", false) => CommandKind::Create {
            mailbox: argument(lexer)?,
        },
        ("DELETE", false) => CommandKind::Delete {
            mailbox: argument(lexer)?,
        },
        ("SUBSCRIBE" | "UNSUBSCRIBE", false) => CommandKind::Subscribe {
            mailbox: argument(lexer)?,
            subscribe: name == "SUBSCRIBE",
        },
        ("LIST" | "LSUB", false) => CommandKind::List {
            reference: argument(lexer)?,
            pattern: argument(lexer)?,
            subscribed: name == "LSUB",
        },
        ("STATUS", false) => {
            let mailbox = argument(lexer)?;
            lexer.expect_space()?;
            let items = parenthesized(lexer, |lexer| {
                let item = lexer.read_atom_string()?;
                status_item(item).ok_or_else(|| lexer.error(&format!("Unknown STATUS item {item}")))
            })?;
            CommandKind::Status { mailbox, items }
        }
        ("APPEND", false) => parse_append(lexer)?,
        ("SEARCH", _) => {
            lexer.expect_space()?;
            CommandKind::Search {
                criteria: search::criteria(lexer)?,
                uid,
            }
        }
        ("FETCH", _) => {
            let set = sequence_set(lexer)?;
            lexer.expect_space()?;
            CommandKind::Fetch {
                set,
                items: fetch_items(lexer)?,
                uid,
            }
        }
        ("STORE", _) => parse_store(lexer, uid)?,
        ("COPY", _) => {
            let set = sequence_set(lexer)?;
            CommandKind::Copy {
                set,
                mailbox: argument(lexer)?,
                uid,
            }
        }
        _ => return Err(lexer.error(&format!("Unknown command {name}"))),
    };
    Ok(kind)
}

/// Reads `SP astring`.
fn argument(lexer: &mut Lexer<'_>) -> Result<String> {
    lexer.expect_space()?;
    lexer.read_astring()
}

/// Reads `SP sequence-set`.
pub(crate) fn sequence_set(lexer: &mut Lexer<'_>) -> Result<SequenceSet> {
    lexer.expect_space()?;
    let text = lexer.read_atom_string()?;
    SequenceSet::parse(text).ok_or_else(|| lexer.error(&format!("Invalid sequence set {text}")))
}

/// Reads `(item SP item ...)`, allowing an empty list.
fn parenthesized<T>(
    lexer: &mut Lexer<'_>,
    mut item: impl FnMut(&mut Lexer<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();
    if lexer.peek() == Some(b')') {
        lexer.advance();
        return Ok(items);
    }
    loop {
        items.push(item(lexer)?);
        match lexer.next_token()? {
            Token::Space => {}
            Token::RParen => return Ok(items),
            token => return Err(lexer.error(&format!("Expected SP or ), got {token:?}"))),
        }
    }
}

fn flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<Flag>> {
    parenthesized(lexer, |lexer| Ok(Flag::parse(lexer.read_atom_string()?)))
}

fn status_item(name: &str) -> Option<StatusItem> {
    Some(match name.to_ascii_uppercase().as_str() {
        "MESSAGES" => StatusItem::Messages,
        "RECENT" => StatusItem::Recent,
        "UIDNEXT" => StatusItem::UidNext,
        "UIDVALIDITY" => StatusItem::UidValidity,
        "UNSEEN" => StatusItem::Unseen,
        _ => return None,
    })
}

/// `APPEND mailbox [SP flag-list] [SP date-time] SP literal`
fn parse_append(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let mailbox = argument(lexer)?;
    lexer.expect_space()?;

    let mut flags = Vec::new();
    if lexer.peek() == Some(b'(') {
        flags = flag_list(lexer)?;
        lexer.expect_space()?;
    }
    // The internal date is accepted but the stored message is dated on arrival.
    if lexer.peek() == Some(b'"') {
        lexer.next_token()?;
        lexer.expect_space()?;
    }

    match lexer.next_token()? {
        Token::Literal(data) => Ok(CommandKind::Append {
            mailbox,
            flags,
            data,
        }),
        token => Err(lexer.error(&format!("Expected message literal, got {token:?}"))),
    }
}

/// `STORE set SP (+|-)FLAGS[.SILENT] SP (flag-list | flag ...)`
fn parse_store(lexer: &mut Lexer<'_>, uid: bool) -> Result<CommandKind> {
    let set = sequence_set(lexer)?;
    lexer.expect_space()?;

    let item = lexer.read_atom_string()?.to_ascii_uppercase();
    let (mode, rest) = match item.as_bytes().first() {
        Some(b'+') => (StoreMode::Add, &item[1..]),
        Some(b'-') => (StoreMode::Remove, &item[1..]),
        _ => (StoreMode::Replace, item.as_str()),
    };
    let silent = match rest {
        "FLAGS" => false,
        "FLAGS.SILENT" => true,
        _ => return Err(lexer.error(&format!("Unknown STORE item {item}"))),
    };

    lexer.expect_space()?;
    let flags = if lexer.peek() == Some(b'(') {
        flag_list(lexer)?
    } else {
        let mut flags = vec![Flag::parse(lexer.read_atom_string()?)];
        while lexer.peek() == Some(b' ') {
            lexer.advance();
            flags.push(Flag::parse(lexer.read_atom_string()?));
        }
        flags
    };

    Ok(CommandKind::Store {
        set,
        mode,
        silent,
        flags,
        uid,
    })
}

fn fetch_items(lexer: &mut Lexer<'_>) -> Result<Vec<FetchAttribute>> {
    if lexer.peek() == Some(b'(') {
        let nested = parenthesized(lexer, fetch_item)?;
        return Ok(nested.into_iter().flatten().collect());
    }
    fetch_item(lexer)
}

/// Reads one fetch item; macros expand to several attributes.
fn fetch_item(lexer: &mut Lexer<'_>) -> Result<Vec<FetchAttribute>> {
    let name = lexer.read_atom_string()?.to_ascii_uppercase();
    let attribute = match name.as_str() {
        "ALL" | "FAST" | "FULL" => {
            return Ok(vec![
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Rfc822Size,
            ]);
        }
        "FLAGS" => FetchAttribute::Flags,
        "UID" => FetchAttribute::Uid,
        "INTERNALDATE" => FetchAttribute::InternalDate,
        "RFC822.SIZE" => FetchAttribute::Rfc822Size,
        "RFC822" => FetchAttribute::Rfc822,
        "RFC822.HEADER" => FetchAttribute::Rfc822Header,
        "RFC822.TEXT" => FetchAttribute::Rfc822Text,
        "BODY" | "BODY.PEEK" => FetchAttribute::Body {
            section: section(lexer)?,
            peek: name == "BODY.PEEK",
        },
        _ => return Err(lexer.error(&format!("Fetch item {name} not supported"))),
    };
    Ok(vec![attribute])
}

/// Reads `[]`, `[HEADER]` or `[TEXT]`.
fn section(lexer: &mut Lexer<'_>) -> Result<Section> {
    lexer.expect(Token::LBracket)?;
    let section = match lexer.next_token()? {
        Token::RBracket => return Ok(Section::Full),
        Token::Atom(s) if s.eq_ignore_ascii_case("HEADER") => Section::Header,
        Token::Atom(s) if s.eq_ignore_ascii_case("TEXT") => Section::Text,
        token => return Err(lexer.error(&format!("Body section {token:?} not supported"))),
    };
    lexer.expect(Token::RBracket)?;
    Ok(section)
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
    use crate::Error;

    fn kind(input: &str) -> CommandKind {
        CommandParser::parse(input.as_bytes()).unwrap().kind
    }

    mod session_command_tests {
        use super::*;

        #[test]
        fn test_login_with_quoted_and_literal() {
            let command = CommandParser::parse(b"a1 LOGIN \"rob smith\" {6}\r\nsecret").unwrap();
            assert_eq!(command.tag, "a1");
            assert_eq!(
                command.kind,
                CommandKind::Login {
                    username: "rob smith".to_string(),
                    password: "secret".to_string()
                }
            );
        }

        #[test]
        fn test_simple_commands_are_case_insensitive() {
            assert_eq!(kind("1 capability"), CommandKind::Capability);
            assert_eq!(kind("2 Noop"), CommandKind::Noop);
            assert_eq!(kind("3 LOGOUT\r\n"), CommandKind::Logout);
        }

        #[test]
        fn test_trailing_garbage_rejected() {
            assert!(CommandParser::parse(b"1 NOOP extra").is_err());
            assert!(CommandParser::parse(b"1 FROB").is_err());
            assert!(CommandParser::parse(b"1").is_err());
        }

        #[test]
        fn test_tag_extraction() {
            assert_eq!(CommandParser::tag(b"a7 FROB"), Some("a7".to_string()));
            assert_eq!(CommandParser::tag(b"(bad"), None);
        }
    }

    mod mailbox_command_tests {
        use super::*;

        #[test]
        fn test_select_and_examine() {
            assert_eq!(
                kind("a SELECT INBOX"),
                CommandKind::Select {
                    mailbox: "INBOX".to_string(),
                    read_only: false
                }
            );
            assert_eq!(
                kind("a EXAMINE \"Sent Items\""),
                CommandKind::Select {
                    mailbox: "Sent Items".to_string(),
                    read_only: true
                }
            );
        }

        #[test]
        fn test_list_patterns() {
            assert_eq!(
                kind("a LIST \"\" *"),
                CommandKind::List {
                    reference: String::new(),
                    pattern: "*".to_string(),
                    subscribed: false
                }
            );
            assert_eq!(
                kind("a LSUB \"\" Archive/%"),
                CommandKind::List {
                    reference: String::new(),
                    pattern: "Archive/%".to_string(),
                    subscribed: true
                }
            );
        }

        #[test]
        fn test_status_items() {
            assert_eq!(
                kind("a STATUS INBOX (MESSAGES UNSEEN uidnext)"),
                CommandKind::Status {
                    mailbox: "INBOX".to_string(),
                    items: vec![StatusItem::Messages, StatusItem::Unseen, StatusItem::UidNext]
                }
            );
            assert!(CommandParser::parse(b"a STATUS INBOX (SIZE)").is_err());
        }

        #[test]
        fn test_append_with_flags_and_date() {
            let input = b"a APPEND Drafts (\\Seen) \"10-Mar-2024 12:00:00 +0000\" {7}\r\nSubject";
            assert_eq!(
                CommandParser::parse(input).unwrap().kind,
                CommandKind::Append {
                    mailbox: "Drafts".to_string(),
                    flags: vec![Flag::Seen],
                    data: b"Subject".to_vec()
                }
            );
        }

        #[test]
        fn test_append_requires_literal() {
            assert!(CommandParser::parse(b"a APPEND INBOX \"text\"").is_err());
        }
    }

    mod message_command_tests {
        use super::*;

        #[test]
        fn test_fetch_macro_and_list() {
            assert_eq!(
                kind("a FETCH 1:* FAST"),
                CommandKind::Fetch {
                    set: SequenceSet::parse("1:*").unwrap(),
                    items: vec![
                        FetchAttribute::Flags,
                        FetchAttribute::InternalDate,
                        FetchAttribute::Rfc822Size
                    ],
                    uid: false
                }
            );
            assert_eq!(
                kind("a UID FETCH 4 (UID BODY.PEEK[HEADER] BODY[])"),
                CommandKind::Fetch {
                    set: SequenceSet::parse("4").unwrap(),
                    items: vec![
                        FetchAttribute::Uid,
                        FetchAttribute::Body {
                            section: Section::Header,
                            peek: true
                        },
                        FetchAttribute::Body {
                            section: Section::Full,
                            peek: false
                        }
                    ],
                    uid: true
                }
            );
        }

        #[test]
        fn test_fetch_envelope_not_supported() {
            let err = CommandParser::parse(b"a FETCH 1 ENVELOPE").unwrap_err();
            assert!(matches!(err, Error::Parse { message, .. } if message.contains("ENVELOPE")));
        }

        #[test]
        fn test_store_variants() {
            assert_eq!(
                kind("a STORE 2 +FLAGS.SILENT (\\Deleted)"),
                CommandKind::Store {
                    set: SequenceSet::parse("2").unwrap(),
                    mode: StoreMode::Add,
                    silent: true,
                    flags: vec![Flag::Deleted],
                    uid: false
                }
            );
            assert_eq!(
                kind("a UID STORE 1:3 FLAGS \\Seen \\Flagged"),
                CommandKind::Store {
                    set: SequenceSet::parse("1:3").unwrap(),
                    mode: StoreMode::Replace,
                    silent: false,
                    flags: vec![Flag::Seen, Flag::Flagged],
                    uid: true
                }
            );
        }

        #[test]
        fn test_copy_and_search() {
            assert_eq!(
                kind("a UID COPY 5 Archive"),
                CommandKind::Copy {
                    set: SequenceSet::parse("5").unwrap(),
                    mailbox: "Archive".to_string(),
                    uid: true
                }
            );
            assert_eq!(
                kind("a SEARCH UNSEEN"),
                CommandKind::Search {
                    criteria: SearchKey::Unseen,
                    uid: false
                }
            );
        }

        #[test]
        fn test_uid_prefix_only_for_message_commands() {
            assert!(CommandParser::parse(b"a UID NOOP").is_err());
        }
    }

    proptest::proptest! {
        #[test]
        fn parse_never_panics(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..120)) {
            let _ = CommandParser::parse(&bytes);
            let _ = CommandParser::tag(&bytes);
        }

        #[test]
        fn parsed_tag_matches_line(tag in "[a-z][a-z0-9]{0,6}") {
            let line = format!("{tag} NOOP");
            let command = CommandParser::parse(line.as_bytes()).unwrap();
            proptest::prop_assert_eq!(command.tag, tag);
        }
    }
}
