//! Tokenizer for client commands.
//!
//! Works on one complete command as assembled by the framing layer: the
//! command line with every literal's octets spliced in after its `{n}`
//! prefix and CRLF.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Cursor over the bytes of one command.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Starts at the first byte of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// True once every byte was consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Current byte, not consumed.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes and returns the current byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn rest(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Lexes the next token and rewinds.
    pub fn peek_token(&mut self) -> Result<Token<'a>> {
        let mark = self.pos;
        let token = self.next_token();
        self.pos = mark;
        token
    }

    /// Lexes and consumes the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        if let Some(token) = punctuation(byte) {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.rest().starts_with(b"\r\n") => {
                self.pos += 2;
                Ok(Token::Crlf)
            }
            b'"' => self.quoted(),
            b'{' => self.literal(),
            _ if is_atom_char(byte) => {
                let atom = self.take_atom()?;
                if atom.bytes().all(|b| b.is_ascii_digit()) {
                    atom.parse()
                        .map(Token::Number)
                        .map_err(|_| self.error("Number too large"))
                } else {
                    Ok(Token::Atom(atom))
                }
            }
            _ => Err(self.error(&format!("Unexpected byte {byte:#04x}"))),
        }
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut text = Vec::new();

        loop {
            let byte = match self.advance() {
                None | Some(b'\r' | b'\n') => return Err(self.error("Unterminated quoted string")),
                Some(b'"') => break,
                Some(b'\\') => self
                    .advance()
                    .filter(|escaped| matches!(escaped, b'"' | b'\\'))
                    .ok_or_else(|| self.error("Bad escape in quoted string"))?,
                Some(byte) => byte,
            };
            text.push(byte);
        }

        String::from_utf8(text)
            .map(Token::QuotedString)
            .map_err(|_| self.error("Invalid UTF-8 in quoted string"))
    }

    /// `{n}` or `{n+}`, CRLF, then `n` octets.
    fn literal(&mut self) -> Result<Token<'a>> {
        let rest = self.rest();
        let close = rest
            .iter()
            .position(|&b| b == b'}')
            .ok_or_else(|| self.error("Unterminated literal prefix"))?;
        let digits = rest[1..close].strip_suffix(b"+").unwrap_or(&rest[1..close]);
        let size: usize = std::str::from_utf8(digits)
            .ok()
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        let body = &rest[close + 1..];
        let Some(body) = body.strip_prefix(b"\r\n") else {
            return Err(self.error("Expected CRLF after literal size"));
        };
        let data = body
            .get(..size)
            .ok_or_else(|| self.error("Incomplete literal data"))?;

        self.pos += close + 3 + size;
        Ok(Token::Literal(data.to_vec()))
    }

    fn take_atom(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let len = rest.iter().take_while(|&&b| is_atom_char(b)).count();
        let atom = std::str::from_utf8(&rest[..len]).map_err(|_| self.error("Invalid UTF-8 in atom"))?;
        self.pos += len;
        Ok(atom)
    }

    /// Parse error at the current offset.
    pub(crate) fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes one SP.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Requires end of input; a final CRLF is allowed.
    pub fn expect_end(&mut self) -> Result<()> {
        match self.next_token()? {
            Token::Eof => Ok(()),
            Token::Crlf if self.is_eof() => Ok(()),
            token => Err(self.error(&format!("Unexpected trailing {token:?}"))),
        }
    }

    /// Reads an astring: atom, number, quoted string or literal.
    ///
    /// An all-digit atom keeps its source text, so `0042` stays `0042`.
    pub fn read_astring(&mut self) -> Result<String> {
        let start = self.pos;
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(_) => Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()),
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => {
                String::from_utf8(data).map_err(|_| self.error("Invalid UTF-8 in literal"))
            }
            token => Err(self.error(&format!("Expected astring, got {token:?}"))),
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads an atom, taking an all-digit one as its text.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        let start = self.pos;
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            Token::Number(_) => std::str::from_utf8(&self.input[start..self.pos])
                .map_err(|_| self.error("Invalid UTF-8 in atom")),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }
}

const fn punctuation(byte: u8) -> Option<Token<'static>> {
    match byte {
        b' ' => Some(Token::Space),
        b'(' => Some(Token::LParen),
        b')' => Some(Token::RParen),
        b'[' => Some(Token::LBracket),
        b']' => Some(Token::RBracket),
        _ => None,
    }
}

/// True for bytes allowed in an atom of a client command.
///
/// Wider than the RFC `ATOM-CHAR`: `\` keeps flags like `\Seen` whole, and
/// `%` and `*` keep list patterns and sequence sets like `1:*` whole.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21..=0x7E) && !matches!(b, b'(' | b')' | b'{' | b'"' | b'[' | b']')
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
    fn test_tagged_command() {
        let mut lexer = Lexer::new(b"A001 LOGIN rob secret\r\n");

        assert_eq!(lexer.next_token().unwrap(), Token::Atom("A001"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("LOGIN"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("rob"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("secret"));
        assert_eq!(lexer.next_token().unwrap(), Token::Crlf);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_numbers_and_sequence_sets() {
        let mut lexer = Lexer::new(b"123 1:* 4,6:7");

        assert_eq!(lexer.next_token().unwrap(), Token::Number(123));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("1:*"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("4,6:7"));
    }

    #[test]
    fn test_quoted_string_escaped() {
        let mut lexer = Lexer::new(b"\"hello \\\"world\\\"\"");

        assert_eq!(
            lexer.next_token().unwrap(),
            Token::QuotedString("hello \"world\"".to_string())
        );
    }

    #[test]
    fn test_unterminated_quoted_string() {
        let mut lexer = Lexer::new(b"\"hello");
        assert!(matches!(lexer.next_token(), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_flags_and_sections() {
        let mut lexer = Lexer::new(b"(\\Seen) BODY.PEEK[HEADER]");

        assert_eq!(lexer.next_token().unwrap(), Token::LParen);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("\\Seen"));
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("BODY.PEEK"));
        assert_eq!(lexer.next_token().unwrap(), Token::LBracket);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("HEADER"));
        assert_eq!(lexer.next_token().unwrap(), Token::RBracket);
    }

    #[test]
    fn test_literals() {
        let mut lexer = Lexer::new(b"{5}\r\nhello {2+}\r\nhi");

        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"hello".to_vec()));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"hi".to_vec()));
    }

    #[test]
    fn test_incomplete_literal() {
        let mut lexer = Lexer::new(b"{10}\r\nshort");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_astring_keeps_digits() {
        let mut lexer = Lexer::new(b"0042 \"quoted\" {3}\r\nlit");

        assert_eq!(lexer.read_astring().unwrap(), "0042");
        lexer.expect_space().unwrap();
        assert_eq!(lexer.read_astring().unwrap(), "quoted");
        lexer.expect_space().unwrap();
        assert_eq!(lexer.read_astring().unwrap(), "lit");
        lexer.expect_end().unwrap();
    }

    #[test]
    fn test_peek_token_does_not_consume() {
        let mut lexer = Lexer::new(b"UID FETCH");
        assert_eq!(lexer.peek_token().unwrap(), Token::Atom("UID"));
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("UID"));
    }

    #[test]
    fn test_is_atom_char() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'*'));
        assert!(is_atom_char(b'%'));
        assert!(is_atom_char(b'\\'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b'['));
        assert!(!is_atom_char(b'{'));
        assert!(!is_atom_char(b'"'));
    }
}
