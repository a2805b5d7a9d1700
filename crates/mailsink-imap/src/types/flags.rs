//! Message flags and STORE semantics.

/// A message flag as seen by IMAP clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent`
    Recent,
    /// Any other flag or keyword, spelled as the client sent it.
    Keyword(String),
}

const SYSTEM_FLAGS: [(Flag, &str); 6] = [
    (Flag::Seen, "\\Seen"),
    (Flag::Answered, "\\Answered"),
    (Flag::Flagged, "\\Flagged"),
    (Flag::Deleted, "\\Deleted"),
    (Flag::Draft, "\\Draft"),
    (Flag::Recent, "\\Recent"),
];

impl Flag {
    /// Maps a flag name to a system flag, ignoring case; anything else
    /// becomes a [`Flag::Keyword`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        SYSTEM_FLAGS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map_or_else(|| Self::Keyword(s.to_string()), |(flag, _)| flag.clone())
    }

    /// Wire spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Keyword(keyword) => keyword,
            system => SYSTEM_FLAGS
                .iter()
                .find(|(flag, _)| flag == system)
                .map_or("", |(_, name)| *name),
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats flags as a parenthesized IMAP list.
#[must_use]
pub fn flag_list(flags: &[Flag]) -> String {
    let names: Vec<&str> = flags.iter().map(Flag::as_str).collect();
    format!("({})", names.join(" "))
}

/// How STORE combines the given flags with the current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// `FLAGS`: replace.
    Replace,
    /// `+FLAGS`: add.
    Add,
    /// `-FLAGS`: remove.
    Remove,
}

impl StoreMode {
    /// Applies this mode to `current`.
    pub fn apply(self, current: &mut Vec<Flag>, flags: &[Flag]) {
        match self {
            Self::Replace => {
                current.clear();
                current.extend(flags.iter().cloned());
            }
            Self::Add => {
                for flag in flags {
                    if !current.contains(flag) {
                        current.push(flag.clone());
                    }
                }
            }
            Self::Remove => current.retain(|f| !flags.contains(f)),
        }
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

    #[test]
    fn test_flag_parse() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\DELETED"), Flag::Deleted);
        assert_eq!(Flag::parse("custom"), Flag::Keyword("custom".to_string()));
        assert_eq!(Flag::Draft.as_str(), "\\Draft");
        assert_eq!(Flag::parse("$Label1").to_string(), "$Label1");
    }

    #[test]
    fn test_flag_list() {
        assert_eq!(flag_list(&[]), "()");
        assert_eq!(flag_list(&[Flag::Seen, Flag::Deleted]), "(\\Seen \\Deleted)");
    }

    #[test]
    fn test_store_modes() {
        let mut flags = vec![Flag::Seen];
        StoreMode::Add.apply(&mut flags, &[Flag::Seen, Flag::Deleted]);
        assert_eq!(flags, vec![Flag::Seen, Flag::Deleted]);

        StoreMode::Remove.apply(&mut flags, &[Flag::Seen]);
        assert_eq!(flags, vec![Flag::Deleted]);

        StoreMode::Replace.apply(&mut flags, &[Flag::Flagged]);
        assert_eq!(flags, vec![Flag::Flagged]);
    }
}
