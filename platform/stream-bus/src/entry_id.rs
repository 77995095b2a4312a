use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::BusError;

/// A stream entry id in Redis Streams form: `{ms}-{seq}`.
///
/// `ms` is milliseconds since the Unix epoch when the entry was appended;
/// `seq` disambiguates entries appended within the same millisecond.
/// Ordering is lexicographic over `(ms, seq)`, which matches insertion
/// order — this is what lets the consumer framework resume "strictly
/// after" a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub ms: u64,
    pub seq: u64,
}

impl EntryId {
    /// The id below every real entry — the default cursor value.
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };

    /// Build an id for "now", given the previous id appended to the same
    /// stream (so the sequence counter increments within a millisecond
    /// instead of colliding).
    pub fn next_after(previous: Option<EntryId>) -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        match previous {
            Some(prev) if prev.ms == ms => EntryId {
                ms,
                seq: prev.seq + 1,
            },
            Some(prev) if prev.ms > ms => EntryId {
                ms: prev.ms,
                seq: prev.seq + 1,
            },
            _ => EntryId { ms, seq: 0 },
        }
    }

    pub fn parse(s: &str) -> Result<Self, BusError> {
        let (ms_part, seq_part) = s
            .split_once('-')
            .ok_or_else(|| BusError::InvalidEntryId(s.to_string()))?;
        let ms = ms_part
            .parse()
            .map_err(|_| BusError::InvalidEntryId(s.to_string()))?;
        let seq = seq_part
            .parse()
            .map_err(|_| BusError::InvalidEntryId(s.to_string()))?;
        Ok(EntryId { ms, seq })
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl PartialOrd for EntryId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntryId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.ms, self.seq).cmp(&(other.ms, other.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_below_everything() {
        let id = EntryId::next_after(None);
        assert!(EntryId::ZERO < id);
    }

    #[test]
    fn parse_round_trips() {
        let id = EntryId { ms: 12345, seq: 7 };
        assert_eq!(EntryId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(EntryId::parse("not-an-id").is_err());
        assert!(EntryId::parse("123").is_err());
    }

    #[test]
    fn next_after_same_millisecond_bumps_sequence() {
        let first = EntryId { ms: 1_000, seq: 0 };
        let second = EntryId::next_after(Some(first));
        // Either a later millisecond (seq resets to 0) or the same
        // millisecond with seq bumped — either way it must be greater.
        assert!(second > first);
    }

    #[test]
    fn ordering_is_lexicographic_on_ms_then_seq() {
        let a = EntryId { ms: 5, seq: 9 };
        let b = EntryId { ms: 6, seq: 0 };
        assert!(a < b);
    }
}
