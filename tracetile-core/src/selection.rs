//! Cursor time selections and symbol measurements.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::SampleRange;

/// A selected span of samples divided into equal symbol segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSelection {
    /// Selected samples.
    pub range: SampleRange,
    /// Sample rate used for time conversions.
    pub rate: f64,
    /// Number of symbols the selection is divided into (at least 1).
    pub segments: u32,
}

impl TimeSelection {
    /// Creates a selection with a single segment.
    #[must_use]
    pub fn new(range: SampleRange, rate: f64) -> Self {
        Self {
            range,
            rate,
            segments: 1,
        }
    }

    /// Changes the segment count while keeping the samples per segment,
    /// growing or shrinking the selection from its start.
    #[must_use]
    pub fn with_segments(mut self, segments: u32) -> Self {
        let segments = segments.max(1);
        let per_segment = self.range.length() as f64 / f64::from(self.segments);
        let length = (f64::from(segments) * per_segment + 0.5) as u64;
        self.range = SampleRange::with_length(self.range.minimum, length);
        self.segments = segments;
        self
    }

    /// Selection duration in seconds.
    #[must_use]
    pub fn period(&self) -> f64 {
        if self.rate <= 0.0 {
            return 0.0;
        }
        self.range.length() as f64 / self.rate
    }

    /// Reciprocal of the selection duration, in Hz.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        recip(self.period())
    }

    /// Duration of one symbol in seconds.
    #[must_use]
    pub fn symbol_period(&self) -> f64 {
        self.period() / f64::from(self.segments.max(1))
    }

    /// Symbols per second (baud).
    #[must_use]
    pub fn symbol_rate(&self) -> f64 {
        recip(self.symbol_period())
    }
}

fn recip(value: f64) -> f64 {
    if value > 0.0 {
        1.0 / value
    } else {
        0.0
    }
}

/// Samples the centre of each of `segments` equal segments of a real trace.
#[must_use]
pub fn extract_symbols(samples: &[f32], segments: u32) -> Vec<f32> {
    if samples.is_empty() || segments == 0 {
        return Vec::new();
    }
    let step = samples.len() as f64 / f64::from(segments);
    let mut symbols = Vec::with_capacity(segments as usize);
    let mut position = step / 2.0;
    while position < samples.len() as f64 {
        symbols.push(samples[position as usize]);
        position += step;
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_measurements() {
        let selection = TimeSelection::new(SampleRange::new(1_000, 3_000), 1e6).with_segments(4);
        assert_eq!(selection.range.length(), 8_000);
        assert_relative_eq!(selection.period(), 8e-3);
        assert_relative_eq!(selection.frequency(), 125.0);
        assert_relative_eq!(selection.symbol_period(), 2e-3);
        assert_relative_eq!(selection.symbol_rate(), 500.0);
    }

    #[test]
    fn test_zero_rate_is_safe() {
        let selection = TimeSelection::new(SampleRange::new(0, 100), 0.0);
        assert_relative_eq!(selection.period(), 0.0);
        assert_relative_eq!(selection.symbol_rate(), 0.0);
    }

    #[test]
    fn test_extract_symbols_samples_centres() {
        let samples: Vec<f32> = (0..100).map(|i| (i / 25) as f32).collect();
        let symbols = extract_symbols(&samples, 4);
        assert_eq!(symbols, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(extract_symbols(&[], 4).is_empty());
    }
}
