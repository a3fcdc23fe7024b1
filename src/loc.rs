//! Source locations for tokens, AST nodes, and errors.
//!
//! A [`Location`] is a column span inside the filter text. Interactive
//! editors use it to highlight the offending range of a rejected filter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A span in the filter text: starting column (byte offset, 0-based) and
/// length in bytes.
///
/// Synthetic nodes that have no source position carry [`Location::EMPTY`],
/// whose start column is `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Starting column, or `-1` when the span is empty.
    pub start: i64,
    /// Span length in bytes.
    pub len: usize,
}

impl Location {
    /// The distinguished "no position" constant.
    pub const EMPTY: Location = Location { start: -1, len: 0 };

    pub fn new(start: usize, len: usize) -> Self {
        Self {
            start: start as i64,
            len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start < 0
    }

    /// Smallest span covering both `self` and `other`. An empty side
    /// contributes nothing.
    pub fn to(self, other: Location) -> Location {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let start = self.start.min(other.start);
        let end = (self.start + self.len as i64).max(other.start + other.len as i64);
        Location {
            start,
            len: (end - start) as usize,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::EMPTY
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<no position>")
        } else {
            write!(f, "column {}", self.start)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_sentinel() {
        assert!(Location::EMPTY.is_empty());
        assert_eq!(Location::EMPTY.start, -1);
        assert_eq!(Location::EMPTY.len, 0);
        assert!(!Location::new(0, 1).is_empty());
    }

    #[test]
    fn test_span_merge() {
        let a = Location::new(2, 3);
        let b = Location::new(8, 4);
        assert_eq!(a.to(b), Location::new(2, 10));
        assert_eq!(b.to(a), Location::new(2, 10));
        assert_eq!(a.to(Location::EMPTY), a);
        assert_eq!(Location::EMPTY.to(b), b);
    }

    #[test]
    fn test_display() {
        assert_eq!(Location::new(7, 2).to_string(), "column 7");
        assert_eq!(Location::EMPTY.to_string(), "<no position>");
    }
}
