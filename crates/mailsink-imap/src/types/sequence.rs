//! Sequence sets for message ranges.

/// One end of a range: a number or `*`, the largest number in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqBound {
    /// A concrete sequence number or UID.
    Value(u32),
    /// `*`.
    Largest,
}

impl SeqBound {
    fn parse(s: &str) -> Option<Self> {
        if s == "*" {
            return Some(Self::Largest);
        }
        s.parse::<u32>().ok().filter(|&n| n > 0).map(Self::Value)
    }

    const fn resolve(self, largest: u32) -> u32 {
        match self {
            Self::Value(n) => n,
            Self::Largest => largest,
        }
    }
}

impl std::fmt::Display for SeqBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(n) => write!(f, "{n}"),
            Self::Largest => write!(f, "*"),
        }
    }
}

/// Sequence set such as `1:3,5,7:*`, over sequence numbers or UIDs.
///
/// Ranges are inclusive in either order, so `5:2` equals `2:5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet {
    ranges: Vec<(SeqBound, SeqBound)>,
}

impl SequenceSet {
    /// Parses a sequence set; returns `None` for malformed input or zero.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let ranges = s
            .split(',')
            .map(|item| match item.split_once(':') {
                Some((start, end)) => Some((SeqBound::parse(start)?, SeqBound::parse(end)?)),
                None => SeqBound::parse(item).map(|b| (b, b)),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { ranges })
    }

    /// Returns true if `n` is in the set, with `*` standing for `largest`.
    #[must_use]
    pub fn contains(&self, n: u32, largest: u32) -> bool {
        self.ranges.iter().any(|(start, end)| {
            let a = start.resolve(largest);
            let b = end.resolve(largest);
            (a.min(b)..=a.max(b)).contains(&n)
        })
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let items: Vec<String> = self
            .ranges
            .iter()
            .map(|(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{start}:{end}")
                }
            })
            .collect();
        write!(f, "{}", items.join(","))
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

    mod parse_tests {
        use super::*;

        #[test]
        fn single_and_ranges() {
            let set = SequenceSet::parse("1:3,5,7:*").unwrap();
            assert_eq!(set.to_string(), "1:3,5,7:*");
        }

        #[test]
        fn zero_and_garbage_rejected() {
            assert!(SequenceSet::parse("0").is_none());
            assert!(SequenceSet::parse("1:0").is_none());
            assert!(SequenceSet::parse("a").is_none());
            assert!(SequenceSet::parse("").is_none());
            assert!(SequenceSet::parse("1,,2").is_none());
        }
    }

    mod contains_tests {
        use super::*;

        #[test]
        fn ranges_are_inclusive() {
            let set = SequenceSet::parse("2:4,9").unwrap();
            assert!(!set.contains(1, 10));
            assert!(set.contains(2, 10));
            assert!(set.contains(4, 10));
            assert!(!set.contains(5, 10));
            assert!(set.contains(9, 10));
        }

        #[test]
        fn star_is_largest() {
            let set = SequenceSet::parse("*").unwrap();
            assert!(set.contains(7, 7));
            assert!(!set.contains(6, 7));

            let tail = SequenceSet::parse("5:*").unwrap();
            assert!(tail.contains(6, 7));
            assert!(!tail.contains(4, 7));
        }

        #[test]
        fn reversed_range() {
            let set = SequenceSet::parse("5:2").unwrap();
            assert!(set.contains(3, 10));
        }
    }
}
