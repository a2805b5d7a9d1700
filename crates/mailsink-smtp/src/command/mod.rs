//! SMTP command-line parser.

use std::sync::LazyLock;

use regex::Regex;

static COMMAND_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9]+)([ :](.*))?").ok());

/// A parsed SMTP command line.
///
/// Parsing never fails; malformed input yields a command that is not
/// [`is_valid`](Self::is_valid).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpCommand {
    text: String,
    verb: String,
    arguments_text: String,
    arguments: Vec<String>,
    valid: bool,
    empty: bool,
}

impl SmtpCommand {
    /// Parses a raw command line (without its CRLF).
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut command = Self {
            text: text.to_string(),
            verb: String::new(),
            arguments_text: String::new(),
            arguments: Vec::new(),
            valid: false,
            empty: false,
        };

        if text.trim().is_empty() {
            command.empty = true;
            return command;
        }

        let Some(captures) = COMMAND_PATTERN.as_ref().and_then(|re| re.captures(text)) else {
            return command;
        };

        command.verb = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        command.arguments = parse_arguments(captures.get(3).map_or("", |m| m.as_str()));
        command.arguments_text = command.arguments.join(" ");
        command.valid = true;
        command
    }

    /// Returns the raw line.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the verb with its original case.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Returns the arguments rejoined with single spaces.
    #[must_use]
    pub fn arguments_text(&self) -> &str {
        &self.arguments_text
    }

    /// Returns the arguments.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Returns true if a verb was recognised syntactically.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns true for a blank line.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.empty
    }
}

/// Splits arguments on spaces outside angle brackets.
///
/// `<Robert Wood <rob@example.com>>` stays one argument.
fn parse_arguments(text: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in text.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ' ' if depth == 0 => {
                if !current.is_empty() {
                    arguments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        arguments.push(current);
    }
    arguments
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
    fn test_simple_verb() {
        let cmd = SmtpCommand::parse("DATA");
        assert!(cmd.is_valid());
        assert_eq!(cmd.verb(), "DATA");
        assert!(cmd.arguments().is_empty());
        assert_eq!(cmd.arguments_text(), "");
    }

    #[test]
    fn test_verb_case_preserved() {
        let cmd = SmtpCommand::parse("ehlo client.example.com");
        assert_eq!(cmd.verb(), "ehlo");
        assert_eq!(cmd.arguments(), ["client.example.com"]);
    }

    #[test]
    fn test_colon_separator() {
        let cmd = SmtpCommand::parse("DATA:ARGS");
        assert_eq!(cmd.verb(), "DATA");
        assert_eq!(cmd.arguments_text(), "ARGS");

        let cmd = SmtpCommand::parse("MAIL:FROM:<x@y.com>");
        assert_eq!(cmd.verb(), "MAIL");
        assert_eq!(cmd.arguments_text(), "FROM:<x@y.com>");
    }

    #[test]
    fn test_mail_from_nested_parse() {
        let cmd = SmtpCommand::parse("MAIL FROM:<a@b.com> SIZE=100");
        assert_eq!(cmd.verb(), "MAIL");
        let sub = SmtpCommand::parse(cmd.arguments_text());
        assert_eq!(sub.verb(), "FROM");
        assert_eq!(sub.arguments(), ["<a@b.com>", "SIZE=100"]);
    }

    #[test]
    fn test_display_name_address_not_split() {
        let cmd = SmtpCommand::parse("FROM:<Robert Wood <rob@example.com>> BODY=8BITMIME");
        assert_eq!(
            cmd.arguments(),
            ["<Robert Wood <rob@example.com>>", "BODY=8BITMIME"]
        );
    }

    #[test]
    fn test_whitespace_normalized() {
        let cmd = SmtpCommand::parse("HELO   a    b");
        assert_eq!(cmd.arguments_text(), "a b");
    }

    #[test]
    fn test_empty_and_blank() {
        for line in ["", "   ", "\t"] {
            let cmd = SmtpCommand::parse(line);
            assert!(cmd.is_empty());
            assert!(!cmd.is_valid());
        }
    }

    #[test]
    fn test_unparseable() {
        let cmd = SmtpCommand::parse("!!! what");
        assert!(!cmd.is_valid());
        assert!(!cmd.is_empty());
        assert_eq!(cmd.text(), "!!! what");
    }

    proptest::proptest! {
        #[test]
        fn parse_is_total(line in "\\PC{0,80}") {
            let cmd = SmtpCommand::parse(&line);
            proptest::prop_assert!(!(cmd.is_valid() && cmd.is_empty()));
            if cmd.is_valid() {
                proptest::prop_assert!(!cmd.verb().is_empty());
                for arg in cmd.arguments() {
                    proptest::prop_assert!(!arg.is_empty());
                }
            }
        }
    }
}
