//! Search criteria parser.

use chrono::NaiveDate;

use crate::Result;
use crate::parser::command::sequence_set;
use crate::parser::lexer::{Lexer, Token};
use crate::search::SearchKey;
use crate::types::SequenceSet;

/// Nesting limit for parenthesized, `NOT` and `OR` keys.
const MAX_DEPTH: usize = 16;

/// Parses `[CHARSET astring SP] search-key *(SP search-key)`.
///
/// A single key is returned as is; several become [`SearchKey::And`].
pub(crate) fn criteria(lexer: &mut Lexer<'_>) -> Result<SearchKey> {
    if let Ok(Token::Atom(atom)) = lexer.peek_token() {
        if atom.eq_ignore_ascii_case("CHARSET") {
            lexer.next_token()?;
            lexer.expect_space()?;
            lexer.read_astring()?;
            lexer.expect_space()?;
        }
    }

    let mut keys = vec![search_key(lexer, MAX_DEPTH)?];
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        keys.push(search_key(lexer, MAX_DEPTH)?);
    }

    Ok(if keys.len() == 1 {
        keys.remove(0)
    } else {
        SearchKey::And(keys)
    })
}

fn search_key(lexer: &mut Lexer<'_>, depth: usize) -> Result<SearchKey> {
    if depth == 0 {
        return Err(lexer.error("Search criteria nested too deeply"));
    }

    if lexer.peek() == Some(b'(') {
        lexer.advance();
        let mut keys = vec![search_key(lexer, depth - 1)?];
        loop {
            match lexer.next_token()? {
                Token::Space => keys.push(search_key(lexer, depth - 1)?),
                Token::RParen => return Ok(SearchKey::And(keys)),
                token => return Err(lexer.error(&format!("Expected SP or ), got {token:?}"))),
            }
        }
    }

    let atom = lexer.read_atom_string()?;
    let key = match atom.to_ascii_uppercase().as_str() {
        "ALL" => SearchKey::All,
        "ANSWERED" => SearchKey::Answered,
        "DELETED" => SearchKey::Deleted,
        "DRAFT" => SearchKey::Draft,
        "FLAGGED" => SearchKey::Flagged,
        "NEW" => SearchKey::New,
        "OLD" => SearchKey::Old,
        "RECENT" => SearchKey::Recent,
        "SEEN" => SearchKey::Seen,
        "UNANSWERED" => SearchKey::Unanswered,
        "UNDELETED" => SearchKey::Undeleted,
        "UNDRAFT" => SearchKey::Undraft,
        "UNFLAGGED" => SearchKey::Unflagged,
        "UNSEEN" => SearchKey::Unseen,

        "BCC" => SearchKey::Bcc(text(lexer)?),
        "BODY" => SearchKey::Body(text(lexer)?),
        "CC" => SearchKey::Cc(text(lexer)?),
        "FROM" => SearchKey::From(text(lexer)?),
        "SUBJECT" => SearchKey::Subject(text(lexer)?),
        "TEXT" => SearchKey::Text(text(lexer)?),
        "TO" => SearchKey::To(text(lexer)?),
        "KEYWORD" => SearchKey::Keyword(text(lexer)?),
        "UNKEYWORD" => SearchKey::Unkeyword(text(lexer)?),
        "HEADER" => {
            let name = text(lexer)?;
            SearchKey::Header(name, text(lexer)?)
        }

        "BEFORE" => SearchKey::Before(date(lexer)?),
        "ON" => SearchKey::On(date(lexer)?),
        "SINCE" => SearchKey::Since(date(lexer)?),
        "SENTBEFORE" => SearchKey::SentBefore(date(lexer)?),
        "SENTON" => SearchKey::SentOn(date(lexer)?),
        "SENTSINCE" => SearchKey::SentSince(date(lexer)?),

        "LARGER" => SearchKey::Larger(number(lexer)?),
        "SMALLER" => SearchKey::Smaller(number(lexer)?),
        "YOUNGER" => SearchKey::Younger(number(lexer)?),
        "OLDER" => SearchKey::Older(number(lexer)?),

        "UID" => SearchKey::Uid(sequence_set(lexer)?),
        "NOT" => {
            lexer.expect_space()?;
            SearchKey::Not(Box::new(search_key(lexer, depth - 1)?))
        }
        "OR" => {
            lexer.expect_space()?;
            let left = search_key(lexer, depth - 1)?;
            lexer.expect_space()?;
            let right = search_key(lexer, depth - 1)?;
            SearchKey::Or(Box::new(left), Box::new(right))
        }

        _ => match SequenceSet::parse(atom) {
            Some(set) => SearchKey::SequenceSet(set),
            None => return Err(lexer.error(&format!("Unknown search key {atom}"))),
        },
    };
    Ok(key)
}

fn text(lexer: &mut Lexer<'_>) -> Result<String> {
    lexer.expect_space()?;
    lexer.read_astring()
}

fn number(lexer: &mut Lexer<'_>) -> Result<u32> {
    lexer.expect_space()?;
    lexer.read_number()
}

/// Reads an IMAP date such as `1-Feb-1994`, bare or quoted.
fn date(lexer: &mut Lexer<'_>) -> Result<NaiveDate> {
    let text = text(lexer)?;
    NaiveDate::parse_from_str(&text, "%d-%b-%Y")
        .map_err(|_| lexer.error(&format!("Invalid date {text}")))
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

    fn parse(input: &str) -> SearchKey {
        let mut lexer = Lexer::new(input.as_bytes());
        let key = criteria(&mut lexer).unwrap();
        lexer.expect_end().unwrap();
        key
    }

    #[test]
    fn test_implicit_and() {
        assert_eq!(
            parse("UNSEEN FROM \"alice smith\""),
            SearchKey::And(vec![
                SearchKey::Unseen,
                SearchKey::From("alice smith".to_string())
            ])
        );
    }

    #[test]
    fn test_charset_is_skipped() {
        assert_eq!(parse("CHARSET UTF-8 ALL"), SearchKey::All);
    }

    #[test]
    fn test_or_not_and_groups() {
        assert_eq!(
            parse("OR SEEN NOT (FROM x SUBJECT y)"),
            SearchKey::Or(
                Box::new(SearchKey::Seen),
                Box::new(SearchKey::Not(Box::new(SearchKey::And(vec![
                    SearchKey::From("x".to_string()),
                    SearchKey::Subject("y".to_string())
                ]))))
            )
        );
    }

    #[test]
    fn test_dates_and_numbers() {
        let date = NaiveDate::from_ymd_opt(1994, 2, 1).unwrap();
        assert_eq!(parse("SINCE 1-Feb-1994"), SearchKey::Since(date));
        assert_eq!(parse("BEFORE \"01-feb-1994\""), SearchKey::Before(date));
        assert_eq!(parse("YOUNGER 3600"), SearchKey::Younger(3600));
        assert_eq!(
            parse("HEADER Message-ID <abc@x>"),
            SearchKey::Header("Message-ID".to_string(), "<abc@x>".to_string())
        );
    }

    #[test]
    fn test_sets() {
        assert_eq!(
            parse("UID 1:5"),
            SearchKey::Uid(SequenceSet::parse("1:5").unwrap())
        );
        assert_eq!(
            parse("2,4"),
            SearchKey::SequenceSet(SequenceSet::parse("2,4").unwrap())
        );
        assert_eq!(
            parse("7"),
            SearchKey::SequenceSet(SequenceSet::parse("7").unwrap())
        );
    }

    #[test]
    fn test_errors() {
        let mut lexer = Lexer::new(b"FROBNICATE");
        assert!(criteria(&mut lexer).is_err());

        let mut lexer = Lexer::new(b"SINCE yesterday");
        assert!(criteria(&mut lexer).is_err());

        let deep = format!("{}ALL{}", "(".repeat(20), ")".repeat(20));
        let mut lexer = Lexer::new(deep.as_bytes());
        assert!(criteria(&mut lexer).is_err());
    }
}
