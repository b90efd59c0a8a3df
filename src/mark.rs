use serde::{Deserialize, Serialize};

use std::cmp::Ordering;
use std::fmt;

/// The tag of one alternative inside a combined pattern.
///
/// Marks count like an odometer over `a..=z`: `a`, `b`, ..., `z`, `aa`,
/// `ab`, ..., `zz`, `aaa`. They order by length first, so the order of
/// marks is the order in which they were issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mark(String);

impl Mark {
    /// The first mark handed out.
    pub fn first() -> Self {
        Mark(String::from("a"))
    }

    /// Parses a mark, rejecting anything but a non-empty run of `a..=z`.
    pub fn parse(s: &str) -> Option<Self> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase()) {
            Some(Mark(s.to_owned()))
        } else {
            None
        }
    }

    /// The mark following this one.
    pub fn next(&self) -> Self {
        let mut bytes = self.0.clone().into_bytes();

        for b in bytes.iter_mut().rev() {
            if *b == b'z' {
                *b = b'a';
            } else {
                *b += 1;
                return Mark(bytes.into_iter().map(char::from).collect());
            }
        }

        // every position rolled over
        let mut s = String::with_capacity(bytes.len() + 1);
        s.push('a');
        s.extend(bytes.into_iter().map(char::from));
        Mark(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Mark {
    fn default() -> Self {
        Mark::first()
    }
}

impl Ord for Mark {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Mark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Mark {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
