//! Address-list extraction.

/// Parses a single mailbox (`addr`, `<addr>` or `Name <addr>`) into a bare address.
///
/// Returns `None` when nothing resembling an address is present.
#[must_use]
pub fn parse_mailbox(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let (Some(start), Some(end)) = (text.rfind('<'), text.rfind('>')) {
        if start < end {
            let inner = text[start + 1..end].trim();
            return (!inner.is_empty()).then(|| inner.to_string());
        }
    }

    // Bare address, possibly followed by a comment.
    let bare = text.split_whitespace().find(|part| part.contains('@'))?;
    Some(bare.trim_matches(|c| c == '"' || c == '(' || c == ')').to_string())
}

/// Extracts bare addresses from an address-list header value.
///
/// Commas inside quoted display names or angle brackets do not split the list.
#[must_use]
pub fn extract_addresses(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut angle_depth = 0usize;

    for ch in value.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                angle_depth += 1;
                current.push(ch);
            }
            '>' if !in_quotes => {
                angle_depth = angle_depth.saturating_sub(1);
                current.push(ch);
            }
            ',' | ';' if !in_quotes && angle_depth == 0 => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    items.push(current);

    items.iter().filter_map(|item| parse_mailbox(item)).collect()
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
    fn test_parse_mailbox_forms() {
        assert_eq!(parse_mailbox("a@b.com").as_deref(), Some("a@b.com"));
        assert_eq!(parse_mailbox("<a@b.com>").as_deref(), Some("a@b.com"));
        assert_eq!(
            parse_mailbox("\"Doe, John\" <john@b.com>").as_deref(),
            Some("john@b.com")
        );
        assert_eq!(parse_mailbox("   ").as_deref(), None);
    }

    #[test]
    fn test_extract_addresses_with_quoted_comma() {
        let addrs = extract_addresses("\"Doe, John\" <john@b.com>, jane@b.com");
        assert_eq!(addrs, vec!["john@b.com", "jane@b.com"]);
    }

    #[test]
    fn test_extract_addresses_empty() {
        assert!(extract_addresses("").is_empty());
    }

    proptest::proptest! {
        #[test]
        fn extracted_addresses_are_never_blank(input in ".{0,64}") {
            for addr in extract_addresses(&input) {
                proptest::prop_assert!(!addr.trim().is_empty());
            }
        }
    }
}
