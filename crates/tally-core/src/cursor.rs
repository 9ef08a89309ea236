//! Change-stream cursor
//!
//! A cursor marks progress through the inbox change stream. Upstream hands them
//! out as decimal strings; inside the workspace they are plain ordered integers
//! so the watermark can be advanced as a monotonic max.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TallyError;

/// Ordered position in the inbox change stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventCursor(u64);

impl EventCursor {
    /// Create from a raw position
    pub const fn new(position: u64) -> Self {
        Self(position)
    }

    /// The raw position
    pub const fn position(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventCursor {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| TallyError::invalid(format!("Invalid cursor {s:?}: {e}")))
    }
}

impl From<u64> for EventCursor {
    fn from(position: u64) -> Self {
        Self(position)
    }
}

// Cursors travel as strings so they round-trip through JSON documents without
// precision loss in consumers that read numbers as f64.
impl Serialize for EventCursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventCursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Repr::Number(n) => Ok(Self(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_ordering() {
        let a = EventCursor::new(10);
        let b = EventCursor::new(42);
        assert!(a < b);
        assert_eq!(a.max(b), b);
    }

    #[test]
    fn test_cursor_accepts_string_or_number() {
        let from_text: EventCursor = serde_json::from_str("\"9876\"").unwrap();
        let from_number: EventCursor = serde_json::from_str("9876").unwrap();
        assert_eq!(from_text, from_number);
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "\"9876\"");
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!("abc".parse::<EventCursor>().is_err());
        assert!("-5".parse::<EventCursor>().is_err());
    }
}
