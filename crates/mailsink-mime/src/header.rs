//! Header fields of a stored message.

use crate::encoding::decode_header_value;

/// One unfolded header field, name kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field name.
    pub name: String,
    /// Unfolded value with surrounding whitespace trimmed.
    pub value: String,
}

/// Header fields in the order they appear in the message.
///
/// Lookups compare names ASCII case-insensitively; repeated fields such as
/// `Received` keep every occurrence.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    /// Creates an empty field list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField {
            name: name.into(),
            value: value.into(),
        });
    }

    fn matching<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a HeaderField> + use<'a, 'b> {
        self.fields
            .iter()
            .filter(move |field| field.name.eq_ignore_ascii_case(name))
    }

    /// Returns the value of the first field called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.matching(name).next().map(|field| field.value.as_str())
    }

    /// Like [`get`](Self::get), with RFC 2047 encoded words decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_header_value)
    }

    /// Returns the values of every field called `name`.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.matching(name).map(|field| field.value.as_str()).collect()
    }

    /// Iterates over all fields in message order.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the block held no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reads fields up to the first empty line.
    ///
    /// Continuation lines (leading space or tab) are joined to the field
    /// above with a single space; lines with no `:` are dropped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut in_field = false;

        for line in text.lines().take_while(|line| !line.is_empty()) {
            if line.starts_with([' ', '\t']) {
                let continuation = line.trim();
                let last = headers.fields.last_mut().filter(|_| in_field);
                if let Some(last) = last.filter(|_| !continuation.is_empty()) {
                    if !last.value.is_empty() {
                        last.value.push(' ');
                    }
                    last.value.push_str(continuation);
                }
                continue;
            }

            in_field = match line.split_once(':') {
                Some((name, value)) => {
                    headers.add(name.trim(), value.trim());
                    true
                }
                None => false,
            };
        }

        headers
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
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.add("X-Mailer", "mailsink");
        assert_eq!(headers.get("x-mailer"), Some("mailsink"));
        assert_eq!(headers.iter().next().unwrap().name, "X-Mailer");
    }

    #[test]
    fn folded_value_is_joined() {
        let headers = Headers::parse(concat!(
            "From: a@example.com\r\n",
            "Subject: Quarterly\r\n",
            "\treport\r\n",
            "\r\n",
            "Body-Line: not a header\r\n"
        ));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("subject"), Some("Quarterly report"));
        assert!(headers.get("Body-Line").is_none());
    }

    #[test]
    fn repeated_fields_keep_order() {
        let headers = Headers::parse("Received: first\r\nTo: x@y\r\nReceived: second\r\n\r\n");
        assert_eq!(headers.get_all("RECEIVED"), vec!["first", "second"]);
    }

    #[test]
    fn value_outlives_lookup_name() {
        let headers = Headers::parse("Subject: Hi\r\nTo: x@y\r\nTo: z@y\r\n\r\n");
        let subject = {
            let name = String::from("SUBJECT");
            headers.get(&name)
        };
        let recipients = {
            let name = "to".to_owned();
            headers.get_all(&name)
        };
        assert_eq!(subject, Some("Hi"));
        assert_eq!(recipients, vec!["x@y", "z@y"]);
    }

    #[test]
    fn stray_line_is_dropped() {
        let headers = Headers::parse("garbage\r\n continued\r\nTo: x@y\r\n\r\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("to"), Some("x@y"));
    }

    #[test]
    fn encoded_subject() {
        let headers = Headers::parse("Subject: =?utf-8?B?SMOpbGxv?=\r\n\r\n");
        assert_eq!(headers.get_decoded("subject").as_deref(), Some("Héllo"));
    }

    #[test]
    fn leading_blank_line_means_no_headers() {
        assert!(Headers::parse("\r\nbody").is_empty());
    }
}
