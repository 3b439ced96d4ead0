//! Half-open ranges over sample indices.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A half-open range `[minimum, maximum)` of sample indices.
///
/// Empty ranges are valid and treated as a no-op by every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleRange {
    /// First sample index in the range.
    pub minimum: u64,
    /// One past the last sample index in the range.
    pub maximum: u64,
}

impl SampleRange {
    /// Creates a range, clamping `maximum` up to `minimum`.
    #[inline]
    #[must_use]
    pub fn new(minimum: u64, maximum: u64) -> Self {
        Self {
            minimum,
            maximum: maximum.max(minimum),
        }
    }

    /// Fallible variant of [`Self::new`].
    ///
    /// # Errors
    /// Returns an error if `minimum > maximum`.
    pub fn try_new(minimum: u64, maximum: u64) -> Result<Self> {
        if minimum > maximum {
            return Err(Error::InvalidRange { minimum, maximum });
        }
        Ok(Self { minimum, maximum })
    }

    /// Creates a range starting at `start` covering `length` samples.
    #[inline]
    #[must_use]
    pub fn with_length(start: u64, length: u64) -> Self {
        Self {
            minimum: start,
            maximum: start.saturating_add(length),
        }
    }

    /// Number of samples in the range.
    #[inline]
    #[must_use]
    pub fn length(&self) -> u64 {
        self.maximum.saturating_sub(self.minimum)
    }

    /// Returns true if the range holds no samples.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Returns true if `sample` lies inside the range.
    #[inline]
    #[must_use]
    pub fn contains(&self, sample: u64) -> bool {
        sample >= self.minimum && sample < self.maximum
    }

    /// Clamps a value into `[minimum, maximum]`.
    #[inline]
    #[must_use]
    pub fn clip(&self, value: u64) -> u64 {
        value.clamp(self.minimum, self.maximum)
    }

    /// Returns the overlap of two ranges (empty when disjoint).
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let minimum = self.minimum.max(other.minimum);
        let maximum = self.maximum.min(other.maximum);
        Self::new(minimum, maximum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_empty() {
        let range = SampleRange::new(100, 250);
        assert_eq!(range.length(), 150);
        assert!(!range.is_empty());

        let empty = SampleRange::new(42, 42);
        assert_eq!(empty.length(), 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_inverted_range_is_rejected_or_clamped() {
        assert!(SampleRange::try_new(10, 5).is_err());
        assert!(SampleRange::new(10, 5).is_empty());
    }

    #[test]
    fn test_beyond_32_bits() {
        let start = u64::from(u32::MAX) + 10;
        let range = SampleRange::with_length(start, 1 << 20);
        assert_eq!(range.length(), 1 << 20);
        assert!(range.contains(start));
        assert!(!range.contains(start + (1 << 20)));
    }

    #[test]
    fn test_intersect() {
        let a = SampleRange::new(0, 100);
        let b = SampleRange::new(50, 150);
        assert_eq!(a.intersect(&b), SampleRange::new(50, 100));
        assert!(a.intersect(&SampleRange::new(200, 300)).is_empty());
    }
}
