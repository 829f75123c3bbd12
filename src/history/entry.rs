// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! A single interval of an [`ActivityHistory`](super::ActivityHistory).
use super::Millis;
use crate::{Value, error::HistoryError};
use std::fmt;

/// Describes a signal over the half-open interval `[start, end)`.
///
/// `data` of `None` is explicit silence: no value is flowing, as opposed to nothing being known.
/// `end` of `None` means the entry extends forever; only the last entry of a history may do so.
///
/// On the wire the fields are called `maybeData`, `startMillis` and `maybeEndMillis`.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Entry<T = Value> {
    #[cfg_attr(feature = "serde", serde(rename = "maybeData"))]
    pub data: Option<T>,
    #[cfg_attr(feature = "serde", serde(rename = "startMillis"))]
    pub start: Millis,
    #[cfg_attr(feature = "serde", serde(rename = "maybeEndMillis"))]
    pub end: Option<Millis>,
}

impl<T: fmt::Debug> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{data:?}")?,
            None => f.write_str("_")?,
        }
        write!(f, "@{}..", self.start)?;
        if let Some(end) = self.end {
            write!(f, "{end}")?;
        }
        Ok(())
    }
}

impl<T> Entry<T> {
    #[must_use]
    pub fn new(data: Option<T>, start: Millis, end: Option<Millis>) -> Self {
        Self { data, start, end }
    }

    /// An entry carrying `data`.
    #[must_use]
    pub fn active(data: T, start: Millis, end: Option<Millis>) -> Self {
        Self::new(Some(data), start, end)
    }

    /// An explicitly silent entry.
    #[must_use]
    pub fn silent(start: Millis, end: Option<Millis>) -> Self {
        Self::new(None, start, end)
    }

    /// Checks that the entry makes sense on its own.
    pub fn validate(&self) -> Result<(), HistoryError> {
        match self.end {
            Some(end) if end < self.start => Err(HistoryError::EndBeforeStart {
                start: self.start,
                end,
            }),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.data.is_none()
    }

    /// Whether the entry covers no time at all. Such entries only ever serve as markers.
    #[must_use]
    pub fn is_zero_width(&self) -> bool {
        self.end == Some(self.start)
    }

    #[must_use]
    pub fn contains(&self, millis: Millis) -> bool {
        self.start <= millis && self.end.is_none_or(|end| millis < end)
    }

    /// Whether the entry ends at or before `millis`. Open-ended entries never do.
    #[must_use]
    pub fn ends_by(&self, millis: Millis) -> bool {
        self.end.is_some_and(|end| end <= millis)
    }

    /// Moves the entry by `delta` along the time axis.
    #[must_use]
    pub fn shifted(self, delta: Millis) -> Self {
        Self {
            data: self.data,
            start: self.start.saturating_add(delta),
            end: self.end.map(|end| end.saturating_add(delta)),
        }
    }

    /// Clips the entry to start no earlier than `millis`.
    ///
    /// Returns `None` if nothing of the entry remains (zero-width remainders are dropped).
    #[must_use]
    pub fn clipped_from(self, millis: Millis) -> Option<Self> {
        let start = self.start.max(millis);
        match self.end {
            Some(end) if end <= start => None,
            _ => Some(Self { start, ..self }),
        }
    }
}

/// Returns the earlier of two entry ends, where `None` stands for "never".
pub(crate) fn min_end(a: Option<Millis>, b: Option<Millis>) -> Option<Millis> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(end), None) | (None, Some(end)) => Some(end),
        (None, None) => None,
    }
}

#[cfg(any(test, feature = "arbitrary"))]
impl quickcheck::Arbitrary for Entry<Value> {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        use quickcheck::Arbitrary;

        // keep times in a narrow band so that entries collide and overlap often
        let start = Millis::from(u8::arbitrary(g));
        let end = if u8::arbitrary(g) % 8 == 0 {
            None
        } else {
            Some(start + Millis::from(u8::arbitrary(g) % 64))
        };
        Self {
            data: Option::<Value>::arbitrary(g),
            start,
            end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entry, value};

    #[test]
    fn validation() {
        assert!(entry!("x", 10, 10).validate().is_ok());
        assert!(entry!(_, 10).validate().is_ok());
        assert_eq!(
            entry!("x", 10, 9).validate(),
            Err(HistoryError::EndBeforeStart { start: 10, end: 9 })
        );
    }

    #[test]
    fn clipping() {
        assert_eq!(entry!("x", 0, 10).clipped_from(5), Some(entry!("x", 5, 10)));
        assert_eq!(entry!("x", 0, 10).clipped_from(10), None);
        assert_eq!(entry!(_, 0).clipped_from(100), Some(entry!(_, 100)));
        assert_eq!(entry!("x", 20, 30).clipped_from(5), Some(entry!("x", 20, 30)));
    }

    #[test]
    fn containment() {
        let e = entry!("x", 0, 10);
        assert!(e.contains(0));
        assert!(e.contains(9));
        assert!(!e.contains(10));
        assert!(e.ends_by(10));
        assert!(!e.ends_by(9));
        assert!(!entry!(_, 0, 0).contains(0));
        assert!(entry!(_, 5).contains(Millis::MAX));
        assert!(!entry!(_, 5).ends_by(Millis::MAX));
    }

    #[test]
    fn shifting() {
        assert_eq!(entry!("x", 0, 10).shifted(50), entry!("x", 50, 60));
        assert_eq!(entry!(_, 0).shifted(50), entry!(_, 50));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", entry!("x", 0, 10)), r#""x"@0..10"#);
        assert_eq!(format!("{:?}", entry!(_, 5)), "_@5..");
        assert_eq!(
            format!("{:?}", Entry::active(value!(["a"]), 1, Some(2))),
            r#"["a"]@1..2"#
        );
    }

    #[test]
    fn min_ends() {
        assert_eq!(min_end(Some(3), Some(5)), Some(3));
        assert_eq!(min_end(None, Some(5)), Some(5));
        assert_eq!(min_end(None, None), None);
    }
}
