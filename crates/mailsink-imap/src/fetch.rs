//! FETCH response rendering.
//!
//! Message data items are sent as synchronizing literals (`{n}` CRLF data),
//! so responses are assembled as bytes rather than strings.

use bytes::{BufMut, Bytes, BytesMut};
use mailsink_core::StoredMessage;

use crate::parser::{FetchAttribute, Section};
use crate::selected::MessageInfo;
use crate::types::flag_list;

/// IMAP `date-time` format.
const INTERNAL_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Renders one `* n FETCH (...)` response.
///
/// With `include_uid`, `UID` is sent first even if not requested, as UID
/// FETCH requires.
#[must_use]
pub fn render(
    seq: u32,
    info: &MessageInfo,
    message: &StoredMessage,
    items: &[FetchAttribute],
    include_uid: bool,
) -> Bytes {
    let mut out = BytesMut::with_capacity(64);
    out.put_slice(format!("* {seq} FETCH (").as_bytes());

    let mut first = true;
    let mut separator = |out: &mut BytesMut| {
        if !first {
            out.put_u8(b' ');
        }
        first = false;
    };

    if include_uid && !items.contains(&FetchAttribute::Uid) {
        separator(&mut out);
        out.put_slice(format!("UID {}", info.uid).as_bytes());
    }

    for item in items {
        separator(&mut out);
        match *item {
            FetchAttribute::Flags => {
                out.put_slice(format!("FLAGS {}", flag_list(&info.flags)).as_bytes());
            }
            FetchAttribute::Uid => out.put_slice(format!("UID {}", info.uid).as_bytes()),
            FetchAttribute::InternalDate => out.put_slice(
                format!(
                    "INTERNALDATE \"{}\"",
                    info.internal_date.format(INTERNAL_DATE_FORMAT)
                )
                .as_bytes(),
            ),
            FetchAttribute::Rfc822Size => {
                out.put_slice(format!("RFC822.SIZE {}", info.size).as_bytes());
            }
            FetchAttribute::Body { section, .. } => {
                let name = format!("BODY[{}]", section.as_str());
                put_literal(&mut out, &name, section_data(message, section));
            }
            FetchAttribute::Rfc822 => put_literal(&mut out, "RFC822", &message.data),
            FetchAttribute::Rfc822Header => {
                put_literal(&mut out, "RFC822.HEADER", section_data(message, Section::Header));
            }
            FetchAttribute::Rfc822Text => {
                put_literal(&mut out, "RFC822.TEXT", section_data(message, Section::Text));
            }
        }
    }

    out.put_u8(b')');
    out.freeze()
}

fn section_data(message: &StoredMessage, section: Section) -> &[u8] {
    match section {
        Section::Full => &message.data,
        Section::Header => mailsink_mime::Message::parse(&message.data).header_block(),
        Section::Text => mailsink_mime::Message::parse(&message.data).body(),
    }
}

fn put_literal(out: &mut BytesMut, name: &str, data: &[u8]) {
    out.put_slice(format!("{name} {{{}}}\r\n", data.len()).as_bytes());
    out.put_slice(data);
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
    use chrono::{TimeZone, Utc};

    const RAW: &[u8] = b"Subject: Hi\r\n\r\nBody\r\n";

    fn message() -> StoredMessage {
        StoredMessage {
            id: 7,
            mailbox: "Default".to_string(),
            folder: "INBOX".to_string(),
            imap_uid: 7,
            from: String::new(),
            to: Vec::new(),
            subject: "Hi".to_string(),
            received_date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap(),
            is_unread: false,
            secure_connection: false,
            data: RAW.to_vec(),
        }
    }

    fn render_items(items: &[FetchAttribute], include_uid: bool) -> Vec<u8> {
        let message = message();
        let info = MessageInfo::from_stored(&message);
        render(3, &info, &message, items, include_uid).to_vec()
    }

    #[test]
    fn test_metadata_items() {
        let out = render_items(
            &[
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Rfc822Size,
            ],
            false,
        );
        assert_eq!(
            out,
            b"* 3 FETCH (FLAGS (\\Seen) INTERNALDATE \"01-Mar-2024 09:05:00 +0000\" RFC822.SIZE 21)"
        );
    }

    #[test]
    fn test_uid_fetch_adds_uid_once() {
        assert_eq!(
            render_items(&[FetchAttribute::Flags], true),
            b"* 3 FETCH (UID 7 FLAGS (\\Seen))"
        );
        assert_eq!(
            render_items(&[FetchAttribute::Uid], true),
            b"* 3 FETCH (UID 7)"
        );
    }

    mod section_tests {
        use super::*;

        #[test]
        fn full_body_is_a_literal() {
            let out = render_items(
                &[FetchAttribute::Body {
                    section: Section::Full,
                    peek: true,
                }],
                false,
            );
            assert_eq!(out, b"* 3 FETCH (BODY[] {21}\r\nSubject: Hi\r\n\r\nBody\r\n)");
        }

        #[test]
        fn header_and_text() {
            let out = render_items(
                &[
                    FetchAttribute::Body {
                        section: Section::Header,
                        peek: false,
                    },
                    FetchAttribute::Rfc822Text,
                ],
                false,
            );
            assert_eq!(
                out,
                b"* 3 FETCH (BODY[HEADER] {15}\r\nSubject: Hi\r\n\r\n RFC822.TEXT {6}\r\nBody\r\n)"
            );
        }
    }
}
