//! Lexical units of a client command.

/// A lexical unit of a client command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare word. Sequence sets (`1:*`), flags (`\Seen`) and list
    /// wildcards lex as a single atom.
    Atom(&'a str),
    /// `"..."` with `\"` and `\\` unescaped.
    QuotedString(String),
    /// Payload of a `{n}` or `{n+}` literal.
    Literal(Vec<u8>),
    /// Atom made only of digits that fits a `u32`.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single SP separator.
    Space,
    /// Trailing CRLF.
    Crlf,
    /// No input left.
    Eof,
}
